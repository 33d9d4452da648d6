//! Callback-to-summary aggregation.
//!
//! One pipeline run handles one callback from start to finish:
//!
//! ```text
//! AwaitingCode -> ExchangingToken -> FetchingPatient -> FetchingClinicalData -> Normalizing -> Complete
//!       \               \                  \
//!        `---------------`------------------`--> Failed
//! ```
//!
//! Only authorization and patient-identity failures are terminal. The three clinical searches
//! run concurrently and each degrades to an empty list on failure, so a summary with partial
//! clinical data is still produced.

use crate::config::ClientConfig;
use crate::error::{ConfigResult, FetchError, PipelineError};
use crate::fetcher::ResourceFetcher;
use crate::oauth::{CallbackParams, OAuthFlow, TokenResult};
use crate::summary::PatientSummary;
use fhir::{BundleEntry, Condition, MedicationRequest, Observation, Patient, ResourceType};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stages of one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    AwaitingCode,
    ExchangingToken,
    FetchingPatient,
    FetchingClinicalData,
    Normalizing,
    Complete,
    Failed { reason: String },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::AwaitingCode => f.write_str("awaiting-code"),
            PipelineState::ExchangingToken => f.write_str("exchanging-token"),
            PipelineState::FetchingPatient => f.write_str("fetching-patient"),
            PipelineState::FetchingClinicalData => f.write_str("fetching-clinical-data"),
            PipelineState::Normalizing => f.write_str("normalizing"),
            PipelineState::Complete => f.write_str("complete"),
            PipelineState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Tracks the current stage of a run and logs each transition.
#[derive(Debug)]
struct Run {
    state: PipelineState,
}

impl Run {
    fn new() -> Self {
        Self {
            state: PipelineState::AwaitingCode,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug!("pipeline {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        error!("pipeline failed while {}: {}", self.state, err);
        self.state = PipelineState::Failed {
            reason: err.to_string(),
        };
        err
    }
}

/// Raw clinical search results for one patient.
struct ClinicalBundles {
    conditions: Vec<BundleEntry>,
    medications: Vec<BundleEntry>,
    observations: Vec<BundleEntry>,
}

/// Orchestrates OAuth, FHIR fetches and normalisation for a callback.
#[derive(Clone, Debug)]
pub struct AggregationPipeline {
    oauth: OAuthFlow,
    fetcher: ResourceFetcher,
}

impl AggregationPipeline {
    /// Build a pipeline and its HTTP client from configuration.
    pub fn new(config: Arc<ClientConfig>) -> ConfigResult<Self> {
        let http = config.build_http_client()?;
        let fetcher = ResourceFetcher::new(&config, http.clone());
        Ok(Self {
            oauth: OAuthFlow::new(config, http),
            fetcher,
        })
    }

    pub fn oauth(&self) -> &OAuthFlow {
        &self.oauth
    }

    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    /// Run the whole flow for one callback.
    ///
    /// # Errors
    /// Returns [`PipelineError`] if the callback is unusable, the token exchange fails, or the
    /// patient cannot be read. No outbound request is made for an unusable callback, and no
    /// resource is fetched when the token exchange fails.
    pub async fn run(&self, params: &CallbackParams) -> Result<PatientSummary, PipelineError> {
        let mut run = Run::new();

        let code = self
            .oauth
            .handle_callback(params)
            .map_err(|e| run.fail(e.into()))?;

        run.advance(PipelineState::ExchangingToken);
        let token = self
            .oauth
            .exchange_token(&code)
            .await
            .map_err(|e| run.fail(e.into()))?;

        run.advance(PipelineState::FetchingPatient);
        let display_name = self
            .fetch_display_name(&token)
            .await
            .map_err(|e| run.fail(e))?;

        run.advance(PipelineState::FetchingClinicalData);
        let bundles = self.fetch_clinical(&token).await;

        run.advance(PipelineState::Normalizing);
        let summary = PatientSummary::assemble(
            token.patient_id.as_str(),
            display_name,
            Condition::texts(&bundles.conditions),
            MedicationRequest::texts(&bundles.medications),
            Observation::from_entries(&bundles.observations),
        );

        run.advance(PipelineState::Complete);
        info!(
            "Assembled summary for patient {}: {} conditions, {} medications, {} observations",
            summary.patient_id(),
            summary.conditions().len(),
            summary.medications().len(),
            summary.observations().len()
        );
        Ok(summary)
    }

    async fn fetch_display_name(&self, token: &TokenResult) -> Result<String, PipelineError> {
        let resource = self
            .fetcher
            .read_resource(
                ResourceType::Patient,
                &token.patient_id,
                Some(&token.access_token),
            )
            .await
            .map_err(PipelineError::PatientFetch)?;

        Patient::from_resource(&resource)
            .map(|p| p.display_name())
            .ok_or_else(|| PipelineError::PatientMissing {
                patient_id: token.patient_id.clone(),
            })
    }

    async fn fetch_clinical(&self, token: &TokenResult) -> ClinicalBundles {
        let (conditions, medications, observations) = tokio::join!(
            self.search_or_empty(ResourceType::Condition, token),
            self.search_or_empty(ResourceType::MedicationRequest, token),
            self.search_or_empty(ResourceType::Observation, token),
        );
        ClinicalBundles {
            conditions,
            medications,
            observations,
        }
    }

    /// Search one clinical resource type for the token's patient; failures become empty.
    async fn search_or_empty(
        &self,
        resource_type: ResourceType,
        token: &TokenResult,
    ) -> Vec<BundleEntry> {
        let result: Result<_, FetchError> = self
            .fetcher
            .fetch_bundle(
                resource_type,
                &[("patient", token.patient_id.as_str())],
                Some(&token.access_token),
            )
            .await;

        result.unwrap_or_else(|err| {
            warn!(
                "{} lookup failed, continuing without it: {}",
                resource_type, err
            );
            Vec::new()
        })
    }
}
