//! FHIR search `Bundle` envelope decoding.
//!
//! Only the envelope is decoded here. Each entry keeps its `resource` as an opaque JSON value
//! because its shape depends on `resourceType`; the per-resource modules decode it later.

use crate::{FhirError, FhirResult};
use serde::Deserialize;
use serde_json::Value;

/// One entry of a search bundle.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BundleEntry {
    #[serde(rename = "fullUrl", default)]
    pub full_url: Option<String>,

    #[serde(default)]
    pub resource: Value,
}

impl BundleEntry {
    /// Build an entry around a bare resource.
    pub fn from_resource(resource: Value) -> Self {
        Self {
            full_url: None,
            resource,
        }
    }

    /// The wrapped resource, if the entry carries a JSON object.
    pub fn resource(&self) -> Option<&Value> {
        self.resource.as_object().map(|_| &self.resource)
    }
}

/// Bundle envelope operations.
///
/// This is a zero-sized type used for namespacing bundle-related operations.
pub struct Bundle;

impl Bundle {
    /// Parse the `entry` array of a search bundle from JSON text.
    ///
    /// A bundle without an `entry` key (or with `"entry": null`) has zero matches and yields an
    /// empty vector rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the text is not JSON or the envelope is not a JSON object with
    /// an array-typed `entry`.
    pub fn parse_entries(json_text: &str) -> FhirResult<Vec<BundleEntry>> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        let wire = serde_path_to_error::deserialize::<_, BundleWire>(&mut deserializer)
            .map_err(schema_error)?;
        Ok(wire.entry.unwrap_or_default())
    }

    /// Same as [`Bundle::parse_entries`], for an already-decoded JSON value.
    pub fn entries_from_value(value: Value) -> FhirResult<Vec<BundleEntry>> {
        let wire = serde_path_to_error::deserialize::<_, BundleWire>(value).map_err(schema_error)?;
        Ok(wire.entry.unwrap_or_default())
    }
}

/// Partial wire representation of a search bundle.
#[derive(Debug, Deserialize)]
struct BundleWire {
    #[serde(default)]
    entry: Option<Vec<BundleEntry>>,
}

fn schema_error<E: std::fmt::Display>(err: serde_path_to_error::Error<E>) -> FhirError {
    let path = err.path().to_string();
    let source = err.into_inner();
    let path = if path.is_empty() || path == "." {
        "<root>"
    } else {
        path.as_str()
    };
    FhirError::Translation(format!("Bundle schema mismatch at {path}: {source}"))
}
