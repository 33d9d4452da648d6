//! FHIR Patient partial wire model and display-name normalisation.
//!
//! Responsibilities:
//! - Define a partial wire model for the fields the summary needs (`id`, `name`)
//! - Translate the first human name into a flat domain record
//! - Apply the placeholder rules for missing name parts
//!
//! Notes:
//! - Unknown keys are ignored; servers return far more than is modelled here
//! - A name with the wrong JSON shape degrades to the placeholder, never to an error

use crate::{is_foreign_resource, ResourceType};
use serde::Deserialize;
use serde_json::Value;

/// Placeholder for a missing given or family name.
pub const MISSING_NAME_PART: &str = "?";

/// Name used by the prose summary when a patient carries no name parts at all.
pub const UNKNOWN_FULL_NAME: &str = "Unknown";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Domain-level carrier for patient identity (flat structure).
///
/// The wire format supports multiple names; only the first (primary) name is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatientData {
    /// Logical id of the resource, when the server returned one.
    pub id: Option<String>,

    /// Given names of the first name entry, in order.
    pub given: Vec<String>,

    /// Family name of the first name entry.
    pub family: Option<String>,
}

impl PatientData {
    /// `"<first given> <family>"`, with `"?"` standing in for either missing part.
    ///
    /// A patient without any `name` entry renders as `"? ?"`.
    pub fn display_name(&self) -> String {
        let given = self
            .given
            .first()
            .map(String::as_str)
            .unwrap_or(MISSING_NAME_PART);
        let family = self.family.as_deref().unwrap_or(MISSING_NAME_PART);
        format!("{given} {family}")
    }

    /// All given names followed by the family name, space-joined.
    ///
    /// Returns `"Unknown"` when the patient has no name parts.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = self
            .given
            .iter()
            .map(String::as_str)
            .chain(self.family.as_deref())
            .collect();
        if parts.is_empty() {
            UNKNOWN_FULL_NAME.to_string()
        } else {
            parts.join(" ")
        }
    }
}

// ============================================================================
// Public Patient operations
// ============================================================================

/// Patient resource operations.
///
/// This is a zero-sized type used for namespacing patient-related operations.
pub struct Patient;

impl Patient {
    /// Normalise a Patient resource.
    ///
    /// Returns `None` only when there is no resource to speak of: the value is not a JSON object,
    /// or it declares a different `resourceType` (for example an `OperationOutcome`).
    /// Everything else yields a record, defaulted as needed.
    pub fn from_resource(resource: &Value) -> Option<PatientData> {
        if !resource.is_object() || is_foreign_resource(resource, ResourceType::Patient) {
            return None;
        }

        let data = match PatientWire::deserialize(resource) {
            Ok(wire) => wire_to_domain(wire),
            Err(_) => PatientData {
                id: resource
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                ..PatientData::default()
            },
        };
        Some(data)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Partial wire representation of a Patient resource.
#[derive(Debug, Deserialize)]
struct PatientWire {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    name: Option<Vec<HumanNameWire>>,
}

/// Partial wire representation of a FHIR `HumanName`.
#[derive(Debug, Deserialize)]
struct HumanNameWire {
    #[serde(default)]
    family: Option<String>,

    #[serde(default)]
    given: Option<Vec<String>>,
}

fn wire_to_domain(wire: PatientWire) -> PatientData {
    let first = wire.name.and_then(|names| names.into_iter().next());
    let (given, family) = match first {
        Some(n) => (n.given.unwrap_or_default(), n.family),
        None => (Vec::new(), None),
    };

    PatientData {
        id: wire.id,
        given,
        family,
    }
}
