//! Client runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the OAuth flow and resource fetcher. Nothing here is read from process-wide
//! state during request handling; binaries collect raw values with [`ConfigValues::from_env`]
//! and hand them to [`ClientConfig::resolve`].

use crate::constants::{
    AUTHORIZE_PATH, DEFAULT_AUTH_BASE, DEFAULT_CLIENT_ID, DEFAULT_FETCH_RETRIES,
    DEFAULT_REDIRECT_URI, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SCOPES, FHIR_PATH_SUFFIX, TOKEN_PATH,
};
use crate::error::{ConfigError, ConfigResult};
use std::time::Duration;
use url::Url;

/// Environment variable names recognised by [`ConfigValues::from_env`].
pub mod env {
    pub const AUTH_BASE: &str = "SMART_AUTH_BASE";
    pub const FHIR_BASE: &str = "SMART_FHIR_BASE";
    pub const CLIENT_ID: &str = "SMART_CLIENT_ID";
    pub const REDIRECT_URI: &str = "SMART_REDIRECT_URI";
    pub const SCOPES: &str = "SMART_SCOPES";
    pub const REQUEST_TIMEOUT_SECS: &str = "SMART_REQUEST_TIMEOUT_SECS";
    pub const FETCH_RETRIES: &str = "SMART_FETCH_RETRIES";
    pub const LISTEN_ADDR: &str = "SMART_LISTEN_ADDR";
}

/// SMART client configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    auth_base: String,
    fhir_base: Url,
    authorize_endpoint: Url,
    token_endpoint: Url,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    request_timeout: Duration,
    fetch_retries: u32,
}

impl ClientConfig {
    /// Create a new `ClientConfig`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidInput`] if either base is not an absolute `http`/`https`
    /// URL, if `client_id` or `redirect_uri` is blank, if `scopes` is empty, or if the timeout
    /// is zero.
    pub fn new(
        auth_base: &str,
        fhir_base: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: Vec<String>,
        request_timeout: Duration,
        fetch_retries: u32,
    ) -> ConfigResult<Self> {
        let auth_url = parse_base_url(auth_base, "auth_base")?;
        let fhir_url = parse_base_url(fhir_base, "fhir_base")?;

        if client_id.trim().is_empty() {
            return Err(ConfigError::InvalidInput("client_id cannot be empty".into()));
        }
        if redirect_uri.trim().is_empty() {
            return Err(ConfigError::InvalidInput(
                "redirect_uri cannot be empty".into(),
            ));
        }
        Url::parse(redirect_uri).map_err(|e| {
            ConfigError::InvalidInput(format!("redirect_uri '{redirect_uri}' is not a URL: {e}"))
        })?;

        let scopes: Vec<String> = scopes
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if scopes.is_empty() {
            return Err(ConfigError::InvalidInput(
                "at least one scope is required".into(),
            ));
        }
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidInput(
                "request_timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            auth_base: base_str(&auth_url),
            authorize_endpoint: join_path(&auth_url, AUTHORIZE_PATH),
            token_endpoint: join_path(&auth_url, TOKEN_PATH),
            fhir_base: fhir_url,
            client_id: client_id.trim().to_string(),
            redirect_uri: redirect_uri.trim().to_string(),
            scopes,
            request_timeout,
            fetch_retries,
        })
    }

    /// Resolve configuration from raw (possibly absent) values, applying defaults.
    ///
    /// The FHIR base defaults to `{auth_base}/fhir`.
    pub fn resolve(values: ConfigValues) -> ConfigResult<Self> {
        let auth_base = non_empty(values.auth_base).unwrap_or_else(|| DEFAULT_AUTH_BASE.into());
        let fhir_base = non_empty(values.fhir_base).unwrap_or_else(|| {
            format!("{}/{FHIR_PATH_SUFFIX}", auth_base.trim_end_matches('/'))
        });
        let client_id = non_empty(values.client_id).unwrap_or_else(|| DEFAULT_CLIENT_ID.into());
        let redirect_uri =
            non_empty(values.redirect_uri).unwrap_or_else(|| DEFAULT_REDIRECT_URI.into());
        let scopes = match non_empty(values.scopes) {
            Some(s) => s.split_whitespace().map(str::to_string).collect(),
            None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let request_timeout = match non_empty(values.request_timeout_secs) {
            Some(s) => Duration::from_secs(s.parse::<u64>().map_err(|e| {
                ConfigError::InvalidInput(format!("{} '{s}': {e}", env::REQUEST_TIMEOUT_SECS))
            })?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        let fetch_retries = match non_empty(values.fetch_retries) {
            Some(s) => s.parse::<u32>().map_err(|e| {
                ConfigError::InvalidInput(format!("{} '{s}': {e}", env::FETCH_RETRIES))
            })?,
            None => DEFAULT_FETCH_RETRIES,
        };

        Self::new(
            &auth_base,
            &fhir_base,
            &client_id,
            &redirect_uri,
            scopes,
            request_timeout,
            fetch_retries,
        )
    }

    /// Authorization base without a trailing slash.
    pub fn auth_base(&self) -> &str {
        &self.auth_base
    }

    /// FHIR base without a trailing slash; this is the `aud` of the authorization request.
    pub fn fhir_base(&self) -> String {
        base_str(&self.fhir_base)
    }

    pub(crate) fn fhir_base_url(&self) -> &Url {
        &self.fhir_base
    }

    pub fn authorize_endpoint(&self) -> &Url {
        &self.authorize_endpoint
    }

    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn fetch_retries(&self) -> u32 {
        self.fetch_retries
    }

    /// Build the HTTP client shared by the token exchange and resource fetches.
    ///
    /// Every call is bounded by `request_timeout`, and idle connections are not kept between
    /// calls.
    pub fn build_http_client(&self) -> ConfigResult<reqwest::Client> {
        build_http_client(self.request_timeout)
    }
}

/// Build a bounded HTTP client for FHIR traffic.
pub fn build_http_client(request_timeout: Duration) -> ConfigResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(request_timeout)
        .timeout(request_timeout)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(ConfigError::HttpClient)
}

/// Raw configuration values as collected from the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigValues {
    pub auth_base: Option<String>,
    pub fhir_base: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<String>,
    pub request_timeout_secs: Option<String>,
    pub fetch_retries: Option<String>,
}

impl ConfigValues {
    /// Read every recognised variable once. Call this at startup only.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            auth_base: var(env::AUTH_BASE),
            fhir_base: var(env::FHIR_BASE),
            client_id: var(env::CLIENT_ID),
            redirect_uri: var(env::REDIRECT_URI),
            scopes: var(env::SCOPES),
            request_timeout_secs: var(env::REQUEST_TIMEOUT_SECS),
            fetch_retries: var(env::FETCH_RETRIES),
        }
    }
}

/// Parse and validate a base URL.
///
/// The URL must be absolute, use `http` or `https`, and be able to carry path segments.
pub fn parse_base_url(value: &str, name: &str) -> ConfigResult<Url> {
    let cleaned = value.trim().trim_end_matches('/');
    let parsed = Url::parse(cleaned)
        .map_err(|e| ConfigError::InvalidInput(format!("{name} '{cleaned}' is invalid: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidInput(format!(
            "{name} must use http or https scheme, got: {}",
            parsed.scheme()
        )));
    }
    if parsed.cannot_be_a_base() {
        return Err(ConfigError::InvalidInput(format!(
            "{name} '{cleaned}' cannot carry a path"
        )));
    }

    Ok(parsed)
}

/// Append `/`-separated `path` to `base`.
pub(crate) fn join_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
    }
    url
}

fn base_str(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
