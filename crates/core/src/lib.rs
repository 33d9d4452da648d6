//! # Summary Core
//!
//! SMART-on-FHIR authorization and patient-summary aggregation.
//!
//! This crate owns the client side of the flow:
//! - Building the authorization URL and validating the provider callback
//! - Exchanging the authorization code for an access token and patient context
//! - Fetching Patient, Condition, MedicationRequest and Observation resources
//! - Normalising the results into a sorted [`PatientSummary`]
//!
//! **No HTTP server concerns**: routing and HTML rendering live in `api-rest`.

pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod generator;
pub mod launch_store;
pub mod oauth;
pub mod pipeline;
pub mod summary;

#[cfg(test)]
mod test_support;

pub use fhir;

pub use config::{ClientConfig, ConfigValues};
pub use error::{AuthError, ConfigError, FetchError, GeneratorError, PipelineError};
pub use fetcher::ResourceFetcher;
pub use generator::{
    render_summary_text, ChatSummaryGenerator, GeneratorConfig, SummaryGenerator, SummaryRequest,
};
pub use launch_store::PendingLaunches;
pub use oauth::{AuthorizationRequest, CallbackParams, OAuthFlow, TokenResult};
pub use pipeline::{AggregationPipeline, PipelineState};
pub use summary::PatientSummary;
