//! Authenticated and open FHIR reads and searches.
//!
//! Every call is a single GET bounded by the client timeout. Transport failures are classified
//! into [`FetchError`] variants so callers can decide what is fatal. When configured with
//! retries, timeouts and refused connections are re-issued with exponential backoff; other
//! failures never are.

use crate::config::{join_path, parse_base_url, ClientConfig};
use crate::constants::{FHIR_JSON, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS};
use crate::error::{ConfigResult, FetchError};
use fhir::{Bundle, BundleEntry, ResourceType};
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// GET client for one FHIR base URL.
#[derive(Clone, Debug)]
pub struct ResourceFetcher {
    http: reqwest::Client,
    base: Url,
    retries: u32,
}

impl ResourceFetcher {
    /// Fetcher for the configured FHIR base.
    pub fn new(config: &ClientConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base: config.fhir_base_url().clone(),
            retries: config.fetch_retries(),
        }
    }

    /// Fetcher for an arbitrary FHIR base, for example an open test server.
    pub fn with_base(base: &str, http: reqwest::Client, retries: u32) -> ConfigResult<Self> {
        Ok(Self {
            http,
            base: parse_base_url(base, "fhir_base")?,
            retries,
        })
    }

    /// Search `{base}/{resource_type}` with `filters` and return the bundle's entries.
    ///
    /// A bundle without an `entry` key is zero matches and yields an empty vector.
    pub async fn fetch_bundle(
        &self,
        resource_type: ResourceType,
        filters: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> Result<Vec<BundleEntry>, FetchError> {
        let url = self.search_url(resource_type, filters);
        let body = self.get_json(&url, bearer).await?;
        let entries = Bundle::entries_from_value(body).map_err(|e| FetchError::InvalidBody {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!("{} search returned {} entries", resource_type, entries.len());
        Ok(entries)
    }

    /// Search like [`Self::fetch_bundle`] but return the undecoded bundle.
    pub async fn search_raw(
        &self,
        resource_type: ResourceType,
        filters: &[(&str, &str)],
        bearer: Option<&str>,
    ) -> Result<Value, FetchError> {
        let url = self.search_url(resource_type, filters);
        self.get_json(&url, bearer).await
    }

    fn search_url(&self, resource_type: ResourceType, filters: &[(&str, &str)]) -> Url {
        let mut url = join_path(&self.base, resource_type.as_str());
        if !filters.is_empty() {
            url.query_pairs_mut().extend_pairs(filters.iter().copied());
        }
        url
    }

    /// Read `{base}/{resource_type}/{id}` and return the raw resource.
    pub async fn read_resource(
        &self,
        resource_type: ResourceType,
        id: &str,
        bearer: Option<&str>,
    ) -> Result<Value, FetchError> {
        let mut url = join_path(&self.base, resource_type.as_str());
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        self.get_json(&url, bearer).await
    }

    /// GET `url` and decode the body as JSON, re-issuing retryable failures.
    async fn get_json(&self, url: &Url, bearer: Option<&str>) -> Result<Value, FetchError> {
        let mut attempt = 0;
        loop {
            match self.get_json_once(url, bearer).await {
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    let backoff = calculate_backoff(attempt);
                    warn!(
                        "GET {} failed ({}), retrying in {:?}",
                        url.path(),
                        err,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn get_json_once(&self, url: &Url, bearer: Option<&str>) -> Result<Value, FetchError> {
        debug!("GET {}", url);
        let mut request = self.http.get(url.clone()).header(ACCEPT, FHIR_JSON);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError {
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::InvalidBody {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Exponential backoff for the given zero-based retry, capped.
fn calculate_backoff(attempt: u32) -> Duration {
    let base = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(base.min(MAX_BACKOFF_MS))
}
