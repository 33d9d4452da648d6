//! FHIR Observation normalisation.
//!
//! Two views are supported:
//! - [`ObservationData`]: the vital-sign view used by the summary (`code.text` label plus
//!   `valueQuantity`). Observations without a measurable value are dropped.
//! - [`CodedReading`]: the listing view used against open servers (first `code.coding` code
//!   plus `valueQuantity`), which never drops and defaults every part instead.

use crate::datatypes::{lenient, CodeableConceptWire, QuantityWire};
use crate::{is_foreign_resource, BundleEntry, ResourceType};
use serde::Deserialize;
use serde_json::Value;

/// Label used when an observation has a value but no `code.text`.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Value shown by [`CodedReading`] when `valueQuantity.value` is absent.
pub const MISSING_VALUE: &str = "N/A";

// ============================================================================
// Public domain-level types
// ============================================================================

/// A labelled quantity taken from an Observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationData {
    /// `code.text`, or `"Unknown"`.
    pub label: String,

    /// `valueQuantity.value` in the server's own decimal notation.
    pub value: String,

    /// `valueQuantity.unit`, or the empty string.
    pub unit: String,
}

impl ObservationData {
    /// `"<value> <unit>"`, as shown next to the label.
    pub fn display(&self) -> String {
        format!("{} {}", self.value, self.unit)
    }
}

/// A coded reading as listed by the open-server smoke tooling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodedReading {
    /// First `code.coding[].code`, or `"Unknown"`.
    pub code: String,

    /// `valueQuantity.value`, or `"N/A"`.
    pub value: String,

    /// `valueQuantity.unit`, or the empty string.
    pub unit: String,
}

// ============================================================================
// Public Observation operations
// ============================================================================

/// Observation resource operations.
pub struct Observation;

impl Observation {
    /// Normalise one Observation, or `None` when it has no `valueQuantity.value`.
    pub fn from_resource(resource: &Value) -> Option<ObservationData> {
        if is_foreign_resource(resource, ResourceType::Observation) {
            return None;
        }
        let wire = ObservationWire::deserialize(resource).ok()?;
        let quantity = wire.value_quantity?;
        let value = quantity.value?;

        let label = wire
            .code
            .as_ref()
            .and_then(CodeableConceptWire::text)
            .unwrap_or(UNKNOWN_LABEL)
            .to_string();

        Some(ObservationData {
            label,
            value: value.to_string(),
            unit: quantity.unit.unwrap_or_default(),
        })
    }

    /// Every observation in `entries` that carries a value, in bundle order.
    pub fn from_entries(entries: &[BundleEntry]) -> Vec<ObservationData> {
        entries
            .iter()
            .filter_map(BundleEntry::resource)
            .filter_map(Self::from_resource)
            .collect()
    }

    /// The coded-reading view of one Observation. Every missing part is defaulted.
    pub fn coded_reading(resource: &Value) -> CodedReading {
        let wire = ObservationWire::deserialize(resource).unwrap_or_default();
        let code = wire
            .code
            .as_ref()
            .and_then(CodeableConceptWire::first_code)
            .unwrap_or(UNKNOWN_LABEL)
            .to_string();
        let quantity = wire.value_quantity.unwrap_or_default();

        CodedReading {
            code,
            value: quantity
                .value
                .map(|v| v.to_string())
                .unwrap_or_else(|| MISSING_VALUE.to_string()),
            unit: quantity.unit.unwrap_or_default(),
        }
    }

    /// Lower-cased `code.text` of each discharge-summary Observation, skipping empty ones.
    pub fn condition_texts(entries: &[BundleEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(BundleEntry::resource)
            .filter_map(|resource| {
                let wire = ObservationWire::deserialize(resource).ok()?;
                let text = wire.code.as_ref().and_then(CodeableConceptWire::text)?;
                (!text.is_empty()).then(|| text.to_lowercase())
            })
            .collect()
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Partial wire representation of an Observation resource.
#[derive(Debug, Default, Deserialize)]
struct ObservationWire {
    #[serde(default, deserialize_with = "lenient")]
    code: Option<CodeableConceptWire>,

    #[serde(rename = "valueQuantity", default, deserialize_with = "lenient")]
    value_quantity: Option<QuantityWire>,
}
