//! The normalised patient summary handed to renderers.

use fhir::ObservationData;

/// Patient identity plus sorted clinical lists. Immutable once assembled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientSummary {
    patient_id: String,
    display_name: String,
    conditions: Vec<String>,
    medications: Vec<String>,
    observations: Vec<ObservationData>,
}

impl PatientSummary {
    /// Assemble a summary, sorting each list.
    ///
    /// - `conditions` and `medications`: ascending, exact (case-sensitive) string order
    /// - `observations`: ascending by lower-cased label; equal labels keep their input order
    pub fn assemble(
        patient_id: impl Into<String>,
        display_name: impl Into<String>,
        mut conditions: Vec<String>,
        mut medications: Vec<String>,
        mut observations: Vec<ObservationData>,
    ) -> Self {
        conditions.sort();
        medications.sort();
        observations.sort_by_cached_key(|o| o.label.to_lowercase());

        Self {
            patient_id: patient_id.into(),
            display_name: display_name.into(),
            conditions,
            medications,
            observations,
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn medications(&self) -> &[String] {
        &self.medications
    }

    pub fn observations(&self) -> &[ObservationData] {
        &self.observations
    }
}
