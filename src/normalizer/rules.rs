//! Extraction rules, one per agent.
//!
//! Each rule reads the fields it knows from the loosely-typed payload and
//! falls back field by field. A rule never fails: anything it cannot make
//! sense of is treated as absent.

use super::views::*;
use crate::models::AgentName;
use serde_json::Value;

pub type ExtractFn = fn(&Value) -> AgentView;

/// agentName -> extraction rule.
pub const RULES: [(AgentName, ExtractFn); 5] = [
    (AgentName::Symptom, extract_symptom),
    (AgentName::Literature, extract_literature),
    (AgentName::Case, extract_case),
    (AgentName::Treatment, extract_treatment),
    (AgentName::Summary, extract_summary),
];

/// Look up the rule for an agent.
pub fn rule_for(agent: AgentName) -> ExtractFn {
    RULES
        .iter()
        .find(|(name, _)| *name == agent)
        .map(|(_, rule)| *rule)
        .unwrap_or(extract_summary)
}

// ── Field helpers ───────────────────────────────────────────

/// First non-empty string among `keys`. Numbers are accepted and printed.
fn text(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First finite numeric value among `keys`, accepting numeric strings like
/// "85" or "85%".
fn number(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        let value = match obj.get(*key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        };
        value.filter(|v: &f64| v.is_finite())
    })
}

fn array<'a>(obj: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    obj.get(key).and_then(Value::as_array)
}

fn string_list(obj: &Value, key: &str) -> Vec<String> {
    array(obj, key)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

// ── Symptom ─────────────────────────────────────────────────

fn confidence_for_risk(risk: &str) -> u8 {
    match risk.to_lowercase().as_str() {
        "high" => 85,
        "medium" | "moderate" => 70,
        "low" => 50,
        _ => 70,
    }
}

pub fn extract_symptom(result: &Value) -> AgentView {
    let findings = array(result, "top_differentials").map(|items| {
        items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| Differential {
                name: text(item, &["name"]).unwrap_or_else(|| "Unnamed condition".to_string()),
                rationale: text(item, &["rationale"]).unwrap_or_default(),
                icd10cm_code: text(item, &["icd10cm_code"]),
            })
            .collect()
    });

    let confidence = text(result, &["risk_level"]).map(|risk| Confidence {
        percent: confidence_for_risk(&risk),
        risk_level: Some(risk),
    });

    AgentView::Symptom(SymptomView {
        findings: Field::or_placeholder(findings, placeholder_findings),
        confidence: Field::or_placeholder(confidence, || Confidence {
            percent: PLACEHOLDER_CONFIDENCE,
            risk_level: None,
        }),
    })
}

// ── Literature ──────────────────────────────────────────────

fn to_reference(item: &Value) -> Option<Reference> {
    match item {
        Value::Object(_) => Some(Reference {
            title: text(item, &["title", "name"])
                .unwrap_or_else(|| "Untitled reference".to_string()),
            pmid: text(item, &["pmid", "PMID"]),
            summary: text(item, &["summary", "abstract"]),
        }),
        Value::String(s) if !s.trim().is_empty() => Some(Reference {
            title: s.trim().to_string(),
            pmid: None,
            summary: None,
        }),
        _ => None,
    }
}

/// `articles` is either `{summaries: [...]}`, a plain sequence, or an
/// object whose values are flattened in upstream key order.
fn article_items(articles: &Value) -> Option<Vec<&Value>> {
    match articles {
        Value::Array(items) => Some(items.iter().collect()),
        Value::Object(map) => {
            if let Some(Value::Array(summaries)) = map.get("summaries") {
                return Some(summaries.iter().collect());
            }
            let flattened = map
                .values()
                .flat_map(|v| match v {
                    Value::Array(items) => items.iter().collect::<Vec<_>>(),
                    other => vec![other],
                })
                .collect();
            Some(flattened)
        }
        _ => None,
    }
}

pub fn extract_literature(result: &Value) -> AgentView {
    let references = result
        .get("articles")
        .and_then(article_items)
        .map(|items| items.into_iter().filter_map(to_reference).collect());

    AgentView::Literature(LiteratureView {
        references: Field::or_placeholder(references, placeholder_references),
    })
}

// ── Case ────────────────────────────────────────────────────

pub fn extract_case(result: &Value) -> AgentView {
    let cases = array(result, "matched_cases").map(|items| {
        items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| SimilarCase {
                name: text(item, &["name", "caseId"]).unwrap_or_else(|| "Unknown case".to_string()),
                score: number(item, &["match_score", "similarity", "score"])
                    .map(MatchScore::from_raw),
                description: text(item, &["description", "outcome"]).unwrap_or_default(),
                code: text(item, &["icd_code"]),
            })
            .collect()
    });

    AgentView::Case(CaseView {
        cases: Field::or_placeholder(cases, placeholder_cases),
    })
}

// ── Treatment ───────────────────────────────────────────────

fn type_lower(item: &Value) -> String {
    text(item, &["type"]).unwrap_or_default().to_lowercase()
}

fn is_drug(item: &Value) -> bool {
    let kind = type_lower(item);
    kind.contains("drug") && !kind.contains("non")
}

fn to_treatment(item: &Value) -> Treatment {
    Treatment {
        name: text(item, &["name", "medication"])
            .unwrap_or_else(|| "Unnamed treatment".to_string()),
        class: text(item, &["class"]),
        rationale: text(item, &["rationale"]),
        source: text(item, &["source"]),
    }
}

/// Split into drug and non-drug. When no entry's type mentions "drug" at
/// all (so "non-drug" counts as typed) but treatments exist, the first
/// three are shown as drugs.
fn partition_treatments(items: &[Value]) -> TreatmentPlan {
    let items: Vec<&Value> = items.iter().filter(|i| i.is_object()).collect();

    if !items.is_empty() && !items.iter().any(|i| type_lower(i).contains("drug")) {
        let split = items.len().min(3);
        return TreatmentPlan {
            drug: items[..split].iter().map(|i| to_treatment(i)).collect(),
            non_drug: items[split..].iter().map(|i| to_treatment(i)).collect(),
        };
    }

    let (drug, non_drug): (Vec<&Value>, Vec<&Value>) =
        items.into_iter().partition(|i| is_drug(i));
    TreatmentPlan {
        drug: drug.into_iter().map(to_treatment).collect(),
        non_drug: non_drug.into_iter().map(to_treatment).collect(),
    }
}

pub fn extract_treatment(result: &Value) -> AgentView {
    let plan = array(result, "treatments").map(|items| partition_treatments(items));

    AgentView::Treatment(TreatmentView {
        plan: Field::or_placeholder(plan, placeholder_treatment_plan),
    })
}

// ── Summary ─────────────────────────────────────────────────

fn recommendations(result: &Value) -> Option<Vec<String>> {
    array(result, "recommendations").map(|items| {
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(_) => text(item, &["content"]),
                _ => None,
            })
            .collect()
    })
}

fn citations(result: &Value) -> Option<Citations> {
    let block = result.get("citations")?;
    let pmids = string_list(block, "pmids");
    let sources = string_list(block, "sources");

    if pmids.is_empty() && sources.is_empty() {
        None
    } else {
        Some(Citations { pmids, sources })
    }
}

pub fn extract_summary(result: &Value) -> AgentView {
    AgentView::Summary(SummaryView {
        patient_summary: Field::or_placeholder(text(result, &["patient_summary"]), || {
            PLACEHOLDER_PATIENT_SUMMARY.to_string()
        }),
        clinical_summary: Field::or_placeholder(text(result, &["clinical_summary"]), || {
            PLACEHOLDER_CLINICAL_SUMMARY.to_string()
        }),
        recommendations: Field::or_placeholder(
            recommendations(result),
            placeholder_recommendations,
        ),
        citations: citations(result),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_table_covers_every_agent() {
        for agent in AgentName::ORDER {
            assert_eq!(rule_for(agent)(&json!({})).agent(), agent);
        }
    }

    #[test]
    fn test_symptom_empty_payload_uses_placeholders() {
        let AgentView::Symptom(view) = extract_symptom(&json!({})) else {
            panic!("wrong view");
        };
        assert!(view.findings.is_placeholder());
        assert_eq!(view.findings.value(), &placeholder_findings());
        assert!(view.confidence.is_placeholder());
        assert_eq!(view.confidence.value().percent, PLACEHOLDER_CONFIDENCE);
    }

    #[test]
    fn test_symptom_fields_read() {
        let payload = json!({
            "top_differentials": [
                {
                    "name": "Community-acquired pneumonia",
                    "rationale": "Fever and productive cough",
                    "icd10cm_code": "J18.9"
                },
                {"name": "Acute bronchitis"}
            ],
            "risk_level": "High"
        });

        let AgentView::Symptom(view) = extract_symptom(&payload) else {
            panic!("wrong view");
        };
        let findings = view.findings.value();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].icd10cm_code.as_deref(), Some("J18.9"));
        assert_eq!(findings[1].rationale, "");
        assert_eq!(view.confidence.value().percent, 85);
        assert_eq!(view.confidence.value().risk_level.as_deref(), Some("High"));
    }

    #[test]
    fn test_literature_object_of_sequences_is_flattened() {
        let payload = json!({
            "articles": {"sectionA": [{"title": "X"}], "sectionB": [{"title": "Y"}]}
        });

        let AgentView::Literature(view) = extract_literature(&payload) else {
            panic!("wrong view");
        };
        let titles: Vec<_> = view.references.value().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["X", "Y"]);
        assert!(!view.references.is_placeholder());
    }

    #[test]
    fn test_literature_summaries_and_plain_sequence() {
        let nested = json!({"articles": {"summaries": [
            {"pmid": "12345", "title": "Statins in elderly", "summary": "Short"}
        ]}});
        let AgentView::Literature(view) = extract_literature(&nested) else {
            panic!("wrong view");
        };
        assert_eq!(view.references.value()[0].pmid.as_deref(), Some("12345"));

        let plain = json!({"articles": [{"title": "A", "abstract": "Long abstract"}, "B"]});
        let AgentView::Literature(view) = extract_literature(&plain) else {
            panic!("wrong view");
        };
        let refs = view.references.value();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].summary.as_deref(), Some("Long abstract"));
        assert_eq!(refs[1].title, "B");
    }

    #[test]
    fn test_literature_unknown_shape_falls_back() {
        let AgentView::Literature(view) = extract_literature(&json!({"articles": "none"})) else {
            panic!("wrong view");
        };
        assert!(view.references.is_placeholder());
    }

    #[test]
    fn test_case_alternate_field_names() {
        let payload = json!({"matched_cases": [
            {"caseId": "C-17", "similarity": 0.9234, "outcome": "Recovered"},
            {
                "name": "Influenza",
                "match_score": 85.0,
                "description": "Viral",
                "icd_code": "ICD10CM:J11"
            }
        ]});

        let AgentView::Case(view) = extract_case(&payload) else {
            panic!("wrong view");
        };
        let cases = view.cases.value();
        assert_eq!(cases[0].name, "C-17");
        assert_eq!(cases[0].score.unwrap().to_string(), "92.34% match");
        assert_eq!(cases[0].description, "Recovered");
        assert_eq!(cases[1].score.unwrap().to_string(), "85% match");
        assert_eq!(cases[1].code.as_deref(), Some("ICD10CM:J11"));
    }

    #[test]
    fn test_case_non_finite_score_is_dropped() {
        let payload = json!({"matched_cases": [
            {"name": "Pertussis", "match_score": "NaN", "similarity": "0.5"},
            {"name": "Croup", "score": "inf"}
        ]});

        let AgentView::Case(view) = extract_case(&payload) else {
            panic!("wrong view");
        };
        let cases = view.cases.value();
        assert_eq!(cases[0].score.unwrap().to_string(), "50% match");
        assert!(cases[1].score.is_none());
    }

    #[test]
    fn test_case_missing_list_falls_back() {
        let AgentView::Case(view) = extract_case(&json!({"query": "cough"})) else {
            panic!("wrong view");
        };
        assert!(view.cases.is_placeholder());
    }

    #[test]
    fn test_treatment_partition_by_type() {
        let payload = json!({"treatments": [
            {"type": "drug", "name": "Amoxicillin", "class": "Penicillin"},
            {"type": "non-drug", "name": "Rest"},
            {"type": "Drug", "medication": "Paracetamol"}
        ]});

        let AgentView::Treatment(view) = extract_treatment(&payload) else {
            panic!("wrong view");
        };
        let plan = view.plan.value();
        let drugs: Vec<_> = plan.drug.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(drugs, vec!["Amoxicillin", "Paracetamol"]);
        assert_eq!(plan.non_drug.len(), 1);
        assert_eq!(plan.non_drug[0].name, "Rest");
    }

    #[test]
    fn test_treatment_defaults_first_three_to_drug() {
        let payload = json!({"treatments": [
            {"name": "A"}, {"name": "B"}, {"name": "C"}, {"name": "D", "type": "lifestyle"}
        ]});

        let AgentView::Treatment(view) = extract_treatment(&payload) else {
            panic!("wrong view");
        };
        let plan = view.plan.value();
        assert_eq!(plan.drug.len(), 3);
        assert_eq!(plan.non_drug.len(), 1);
        assert_eq!(plan.non_drug[0].name, "D");
    }

    #[test]
    fn test_treatment_non_drug_only_plan_stays_non_drug() {
        let payload = json!({"treatments": [
            {"type": "non-drug", "name": "Consult Healthcare Provider"}
        ]});

        let AgentView::Treatment(view) = extract_treatment(&payload) else {
            panic!("wrong view");
        };
        let plan = view.plan.value();
        assert!(plan.drug.is_empty());
        assert_eq!(plan.non_drug.len(), 1);
        assert_eq!(plan.non_drug[0].name, "Consult Healthcare Provider");
    }

    #[test]
    fn test_treatment_absent_uses_placeholder_plan() {
        let AgentView::Treatment(view) = extract_treatment(&json!({})) else {
            panic!("wrong view");
        };
        assert!(view.plan.is_placeholder());
        assert_eq!(view.plan.value(), &placeholder_treatment_plan());
    }

    #[test]
    fn test_summary_fields_fall_back_independently() {
        let payload = json!({"patient_summary": "ok", "recommendations": ["Rest"]});

        let AgentView::Summary(view) = extract_summary(&payload) else {
            panic!("wrong view");
        };
        assert_eq!(view.patient_summary, Field::Provided("ok".to_string()));
        assert!(view.clinical_summary.is_placeholder());
        assert_eq!(view.recommendations.value(), &vec!["Rest".to_string()]);
        assert!(view.citations.is_none());
    }

    #[test]
    fn test_summary_recommendation_objects_and_citations() {
        let payload = json!({
            "recommendations": [{"type": "next_steps", "content": "Chest X-ray"}, "Hydration"],
            "citations": {"pmids": ["111", 222], "sources": []}
        });

        let AgentView::Summary(view) = extract_summary(&payload) else {
            panic!("wrong view");
        };
        assert_eq!(
            view.recommendations.value(),
            &vec!["Chest X-ray".to_string(), "Hydration".to_string()]
        );
        let citations = view.citations.unwrap();
        assert_eq!(citations.pmids, vec!["111", "222"]);
        assert!(citations.sources.is_empty());
    }

    #[test]
    fn test_summary_empty_citations_omitted() {
        let payload = json!({"citations": {"pmids": [], "sources": []}});
        let AgentView::Summary(view) = extract_summary(&payload) else {
            panic!("wrong view");
        };
        assert!(view.citations.is_none());
    }
}
