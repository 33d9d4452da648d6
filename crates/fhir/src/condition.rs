//! FHIR Condition normalisation.
//!
//! A condition contributes its `code.text`. Entries without a `code` object, or whose code
//! carries no `text`, are dropped rather than defaulted.

use crate::datatypes::{lenient, CodeableConceptWire};
use crate::{is_foreign_resource, BundleEntry, ResourceType};
use serde::Deserialize;
use serde_json::Value;

/// Condition resource operations.
pub struct Condition;

impl Condition {
    /// The display text of one Condition resource, or `None` if it must be dropped.
    pub fn text(resource: &Value) -> Option<String> {
        if is_foreign_resource(resource, ResourceType::Condition) {
            return None;
        }
        let wire = ConditionWire::deserialize(resource).ok()?;
        wire.code?.text().map(str::to_string)
    }

    /// Texts of every usable Condition in `entries`, in bundle order.
    pub fn texts(entries: &[BundleEntry]) -> Vec<String> {
        entries
            .iter()
            .filter_map(BundleEntry::resource)
            .filter_map(Self::text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ConditionWire {
    #[serde(default, deserialize_with = "lenient")]
    code: Option<CodeableConceptWire>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(resource: Value) -> BundleEntry {
        BundleEntry::from_resource(resource)
    }

    #[test]
    fn extracts_code_text() {
        let resource = json!({"resourceType": "Condition", "code": {"text": "Asthma"}});
        assert_eq!(Condition::text(&resource).as_deref(), Some("Asthma"));
    }

    #[test]
    fn drops_entries_without_code_or_text() {
        let entries = vec![
            entry(json!({"code": {"text": "Asthma"}})),
            entry(json!({"clinicalStatus": {"text": "active"}})),
            entry(json!({"code": {"coding": [{"code": "195967001"}]}})),
            entry(json!({"code": {"text": "Hypertension"}})),
        ];

        let texts = Condition::texts(&entries);
        assert_eq!(texts, vec!["Asthma", "Hypertension"]);
        assert_eq!(texts.len(), entries.len() - 2);
    }

    #[test]
    fn unrelated_malformed_fields_do_not_drop_the_text() {
        let resource = json!({
            "code": {"text": "Asthma", "coding": {"code": "195967001"}},
            "onsetDateTime": 2015
        });
        assert_eq!(Condition::text(&resource).as_deref(), Some("Asthma"));
    }

    #[test]
    fn drops_malformed_code_and_foreign_resources() {
        let entries = vec![
            entry(json!({"code": "Asthma"})),
            entry(json!({"resourceType": "OperationOutcome", "code": {"text": "x"}})),
            BundleEntry::default(),
        ];
        assert!(Condition::texts(&entries).is_empty());
    }
}
