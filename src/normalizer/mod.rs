//! Result normalizer.
//!
//! Turns raw agent payloads into display-ready views. Upstream payload
//! shapes are not fixed per field, so every agent has one extraction rule
//! (see [`rules::RULES`]) that falls back to placeholder content instead
//! of failing.

pub mod rules;
pub mod views;

pub use views::*;

use crate::models::{AgentName, AgentResult, AgentStatus};
use serde_json::Value;

/// Normalize a single payload for the given agent.
pub fn normalize(agent: AgentName, result: &Value) -> AgentView {
    rules::rule_for(agent)(result)
}

/// View for one entry, or `None` unless it has completed.
pub fn normalize_result(entry: &AgentResult) -> Option<AgentView> {
    if entry.status != AgentStatus::Completed {
        return None;
    }

    let empty = Value::Object(Default::default());
    Some(normalize(
        entry.agent_name,
        entry.result.as_ref().unwrap_or(&empty),
    ))
}

/// Views for every completed result, in the fixed agent order regardless
/// of the order the results arrived in.
pub fn render_completed(results: &[AgentResult]) -> Vec<AgentView> {
    AgentName::ORDER
        .iter()
        .filter_map(|agent| results.iter().find(|r| r.agent_name == *agent))
        .filter_map(normalize_result)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn entry(agent: AgentName, status: AgentStatus, result: Option<Value>) -> AgentResult {
        AgentResult {
            agent_name: agent,
            status,
            result,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_render_uses_fixed_order() {
        let results = vec![
            entry(AgentName::Summary, AgentStatus::Completed, Some(json!({}))),
            entry(AgentName::Case, AgentStatus::Completed, Some(json!({}))),
            entry(AgentName::Symptom, AgentStatus::Completed, Some(json!({}))),
        ];

        let agents: Vec<_> = render_completed(&results).iter().map(AgentView::agent).collect();
        assert_eq!(
            agents,
            vec![AgentName::Symptom, AgentName::Case, AgentName::Summary]
        );
    }

    #[test]
    fn test_render_skips_unfinished_and_failed() {
        let results = vec![
            entry(AgentName::Symptom, AgentStatus::Running, None),
            entry(AgentName::Literature, AgentStatus::Error, None),
            entry(AgentName::Treatment, AgentStatus::Pending, None),
            entry(AgentName::Summary, AgentStatus::Completed, Some(json!({}))),
        ];

        let views = render_completed(&results);
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].agent(), AgentName::Summary);
    }

    #[test]
    fn test_completed_without_payload_renders_placeholders() {
        let view = normalize_result(&entry(AgentName::Symptom, AgentStatus::Completed, None))
            .unwrap();
        let AgentView::Symptom(symptom) = view else {
            panic!("wrong view");
        };
        assert!(symptom.findings.is_placeholder());
        assert!(symptom.confidence.is_placeholder());
    }

    #[test]
    fn test_fixture_payloads_normalize() {
        let symptom: Value =
            serde_json::from_str(include_str!("../../fixtures/symptom_analysis.json")).unwrap();
        let AgentView::Symptom(view) = normalize(AgentName::Symptom, &symptom) else {
            panic!("wrong view");
        };
        assert!(!view.findings.is_placeholder());
        assert_eq!(view.findings.value()[0].icd10cm_code.as_deref(), Some("J18.9"));

        let treatment: Value =
            serde_json::from_str(include_str!("../../fixtures/treatment.json")).unwrap();
        let AgentView::Treatment(view) = normalize(AgentName::Treatment, &treatment) else {
            panic!("wrong view");
        };
        assert_eq!(view.plan.value().drug.len(), 2);
        assert_eq!(view.plan.value().non_drug.len(), 2);

        let literature: Value =
            serde_json::from_str(include_str!("../../fixtures/literature.json")).unwrap();
        let AgentView::Literature(view) = normalize(AgentName::Literature, &literature) else {
            panic!("wrong view");
        };
        assert_eq!(view.references.value().len(), 2);
    }
}
