//! Patient intake form handling.
//!
//! A [`CaseForm`] holds what the user typed (or what a case file
//! contained). It only becomes a [`PatientCase`] after validation; the
//! store never sees an unvalidated case.

use crate::error::ValidationError;
use crate::models::{split_entries, Medications, PatientCase, Urgency};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Raw intake form contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaseForm {
    pub patient_id: String,
    pub age: u32,
    pub gender: String,
    pub symptoms: String,
    pub medical_history: String,
    pub current_medications: Option<Medications>,
    pub urgency: Option<Urgency>,
}

impl CaseForm {
    /// Load a form from a JSON case file.
    pub fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::InvalidCaseFile(format!("{}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| ValidationError::InvalidCaseFile(format!("{}: {}", path.display(), e)))
    }

    /// Validate the form and produce the case to store.
    pub fn validate(self) -> Result<PatientCase, ValidationError> {
        let patient_id = self.patient_id.trim().to_string();
        if patient_id.is_empty() {
            return Err(ValidationError::MissingPatientId);
        }

        let symptoms = split_entries(&self.symptoms);
        if symptoms.is_empty() {
            return Err(ValidationError::MissingSymptoms);
        }
        let symptoms = symptoms.join(", ");

        let medical_history = split_entries(&self.medical_history).join(", ");

        let current_medications = match self.current_medications {
            Some(Medications::List(items)) => Medications::List(
                items
                    .into_iter()
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect(),
            ),
            Some(Medications::Text(text)) => Medications::Text(text.trim().to_string()),
            None => Medications::default(),
        };

        debug!(
            "Validated case {} with {} symptom(s)",
            patient_id,
            symptoms.split(", ").count()
        );

        Ok(PatientCase {
            patient_id,
            age: self.age,
            gender: self.gender.trim().to_string(),
            symptoms,
            medical_history,
            current_medications,
            urgency: self.urgency.unwrap_or_default(),
        })
    }
}
