//! FHIR MedicationRequest normalisation.
//!
//! A request contributes `medicationCodeableConcept.text`. Requests that reference a
//! `Medication` resource instead (`medicationReference`) carry no inline concept and are
//! dropped, as are concepts without `text`.

use crate::datatypes::{lenient, CodeableConceptWire};
use crate::{is_foreign_resource, BundleEntry, ResourceType};
use serde::Deserialize;
use serde_json::Value;

/// MedicationRequest resource operations.
pub struct MedicationRequest;

impl MedicationRequest {
    /// The medication text of one MedicationRequest, or `None` if it must be dropped.
    pub fn text(resource: &Value) -> Option<String> {
        if is_foreign_resource(resource, ResourceType::MedicationRequest) {
            return None;
        }
        let wire = MedicationRequestWire::deserialize(resource).ok()?;
        wire.medication_codeable_concept?.text().map(str::to_string)
    }

    /// Medication texts of every usable request in `entries`, in bundle order.
    pub fn texts(entries: &[BundleEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(BundleEntry::resource)
            .filter_map(Self::text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct MedicationRequestWire {
    #[serde(
        rename = "medicationCodeableConcept",
        default,
        deserialize_with = "lenient"
    )]
    medication_codeable_concept: Option<CodeableConceptWire>,
}
