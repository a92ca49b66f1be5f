//! PDF export payload.
//!
//! The analysis API renders the PDF; this module only decides what goes
//! into it: the patient details and one raw result block per completed
//! agent, keyed by the agent's report key.

use crate::error::ValidationError;
use crate::models::{AgentName, AgentStatus, PatientCase};
use crate::store::SessionStore;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientInfo {
    #[serde(flatten)]
    pub case: PatientCase,
    pub primary_complaint: String,
}

impl From<&PatientCase> for PatientInfo {
    fn from(case: &PatientCase) -> Self {
        Self {
            primary_complaint: case
                .symptom_list()
                .first()
                .copied()
                .unwrap_or_default()
                .to_string(),
            case: case.clone(),
        }
    }
}

/// Body of the `generate-pdf` request. Absent agents are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptom_analysis: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literature: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_matcher: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

impl ReportPayload {
    fn slot(&mut self, agent: AgentName) -> &mut Option<Value> {
        match agent {
            AgentName::Symptom => &mut self.symptom_analysis,
            AgentName::Literature => &mut self.literature,
            AgentName::Case => &mut self.case_matcher,
            AgentName::Treatment => &mut self.treatment,
            AgentName::Summary => &mut self.summary,
        }
    }

    /// Number of agent blocks included.
    pub fn section_count(&self) -> usize {
        [
            &self.symptom_analysis,
            &self.literature,
            &self.case_matcher,
            &self.treatment,
            &self.summary,
        ]
        .iter()
        .filter(|s| s.is_some())
        .count()
    }

    /// Assemble the payload from the store's completed results. Fails
    /// before any network call when nothing has completed.
    pub fn from_store(store: &SessionStore) -> Result<Self, ValidationError> {
        let mut payload = ReportPayload {
            patient_info: store.current_case().map(PatientInfo::from),
            ..ReportPayload::default()
        };

        for agent in AgentName::ORDER {
            let Some(result) = store.agent_result(agent) else {
                continue;
            };
            if result.status != AgentStatus::Completed {
                continue;
            }
            *payload.slot(agent) = Some(
                result
                    .result
                    .clone()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            );
        }

        if payload.section_count() == 0 {
            return Err(ValidationError::NothingToExport);
        }

        debug!("PDF payload with {} section(s)", payload.section_count());
        Ok(payload)
    }
}
