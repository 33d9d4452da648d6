//! Partial wire models for the FHIR complex datatypes the resource modules share.
//!
//! Every field is decoded with [`lenient`]: a field of the wrong JSON type reads as absent
//! instead of failing the enclosing resource.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Decode an optional field, treating a value of the wrong shape as missing.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Partial wire representation of a FHIR `CodeableConcept`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CodeableConceptWire {
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub coding: Option<Vec<CodingWire>>,
}

impl CodeableConceptWire {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// `code` of the first coding, if any.
    pub fn first_code(&self) -> Option<&str> {
        self.coding
            .as_ref()
            .and_then(|codings| codings.first())
            .and_then(|c| c.code.as_deref())
    }
}

/// Partial wire representation of a FHIR `Coding`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CodingWire {
    #[serde(default, deserialize_with = "lenient")]
    pub code: Option<String>,
}

/// Partial wire representation of a FHIR `Quantity`.
///
/// `value` stays a JSON number so its textual form (`72` vs `72.0`) is preserved.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct QuantityWire {
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<serde_json::Number>,

    #[serde(default, deserialize_with = "lenient")]
    pub unit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrong_shapes_read_as_absent() {
        let concept = CodeableConceptWire::deserialize(&json!({
            "text": "Heart rate",
            "coding": {"code": "8867-4"}
        }))
        .expect("concept");
        assert_eq!(concept.text(), Some("Heart rate"));
        assert_eq!(concept.first_code(), None);

        let quantity = QuantityWire::deserialize(&json!({"value": "72", "unit": 5}))
            .expect("quantity");
        assert!(quantity.value.is_none());
        assert!(quantity.unit.is_none());
    }
}
