//! FHIR wire/boundary support for the SMART launch summary.
//!
//! This crate provides **partial wire models** and **normalisation helpers** for the FHIR R4
//! JSON returned by a SMART-enabled server:
//! - search `Bundle` envelopes, decoded into opaque entries
//! - Patient, Condition, MedicationRequest and Observation resources
//!
//! This crate focuses on:
//! - decoding each resource once into a typed-but-partial DTO
//! - applying the defaulting and drop rules for missing substructure in one place
//! - translation from wire DTOs to small flat domain records
//!
//! It performs no network I/O. Fetching lives in `summary-core`.
//!
//! Normalisation never fails: a resource whose relevant fields are missing (or have the wrong
//! JSON type) is either defaulted or dropped, depending on the resource.

pub mod bundle;
pub mod condition;
mod datatypes;
pub mod medication_request;
pub mod observation;
pub mod patient;

// Re-export facades
pub use bundle::{Bundle, BundleEntry};
pub use condition::Condition;
pub use medication_request::MedicationRequest;
pub use observation::Observation;
pub use patient::Patient;

// Re-export public domain-level types
pub use observation::{CodedReading, ObservationData};
pub use patient::PatientData;

/// FHIR resource types this crate knows how to normalise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Patient,
    Condition,
    MedicationRequest,
    Observation,
}

impl ResourceType {
    /// The `resourceType` string and REST path segment for this type.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Condition => "Condition",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::Observation => "Observation",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Returns `true` when `resource` declares a `resourceType` other than `expected`.
///
/// A resource without `resourceType` is accepted; some servers (and test fixtures) omit it on
/// direct reads.
pub(crate) fn is_foreign_resource(resource: &serde_json::Value, expected: ResourceType) -> bool {
    match resource.get("resourceType").and_then(|v| v.as_str()) {
        Some(rt) => rt != expected.as_str(),
        None => false,
    }
}
