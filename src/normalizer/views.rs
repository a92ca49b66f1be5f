//! Render-ready views of agent results, and the placeholder content shown
//! when an upstream payload leaves a field out.

use crate::models::AgentName;
use serde::Serialize;
use std::fmt;

/// A view field that either came from the payload or is a stand-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "lowercase")]
pub enum Field<T> {
    Provided(T),
    Placeholder(T),
}

impl<T> Field<T> {
    pub fn value(&self) -> &T {
        match self {
            Field::Provided(v) | Field::Placeholder(v) => v,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Field::Placeholder(_))
    }

    /// `Provided` when the extraction succeeded, otherwise the fallback.
    pub fn or_placeholder(extracted: Option<T>, fallback: impl FnOnce() -> T) -> Self {
        match extracted {
            Some(v) => Field::Provided(v),
            None => Field::Placeholder(fallback()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Differential {
    pub name: String,
    pub rationale: String,
    pub icd10cm_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confidence {
    pub percent: u8,
    pub risk_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomView {
    pub findings: Field<Vec<Differential>>,
    pub confidence: Field<Confidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub title: String,
    pub pmid: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiteratureView {
    pub references: Field<Vec<Reference>>,
}

/// Similarity on a 0-100 scale, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchScore(pub f64);

impl MatchScore {
    /// Normalize a raw upstream score. Values up to 1.0 are fractions and
    /// are scaled by 100; larger values are already percentages.
    pub fn from_raw(raw: f64) -> Self {
        let percent = if raw <= 1.0 { raw * 100.0 } else { raw };
        let clamped = percent.clamp(0.0, 100.0);
        MatchScore((clamped * 100.0).round() / 100.0)
    }
}

impl fmt::Display for MatchScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% match", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCase {
    pub name: String,
    pub score: Option<MatchScore>,
    pub description: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseView {
    pub cases: Field<Vec<SimilarCase>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Treatment {
    pub name: String,
    pub class: Option<String>,
    pub rationale: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentPlan {
    pub drug: Vec<Treatment>,
    pub non_drug: Vec<Treatment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentView {
    pub plan: Field<TreatmentPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citations {
    pub pmids: Vec<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub patient_summary: Field<String>,
    pub clinical_summary: Field<String>,
    pub recommendations: Field<Vec<String>>,
    /// Omitted when neither pmids nor sources carry anything.
    pub citations: Option<Citations>,
}

/// Normalized output for one completed agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "agent", rename_all = "lowercase")]
pub enum AgentView {
    Symptom(SymptomView),
    Literature(LiteratureView),
    Case(CaseView),
    Treatment(TreatmentView),
    Summary(SummaryView),
}

impl AgentView {
    pub fn agent(&self) -> AgentName {
        match self {
            AgentView::Symptom(_) => AgentName::Symptom,
            AgentView::Literature(_) => AgentName::Literature,
            AgentView::Case(_) => AgentName::Case,
            AgentView::Treatment(_) => AgentName::Treatment,
            AgentView::Summary(_) => AgentName::Summary,
        }
    }
}

// ── Placeholders ────────────────────────────────────────────

pub const PLACEHOLDER_CONFIDENCE: u8 = 75;

pub const PLACEHOLDER_PATIENT_SUMMARY: &str =
    "Patient summary is not available for this analysis.";

pub const PLACEHOLDER_CLINICAL_SUMMARY: &str =
    "Clinical summary is not available. Review the individual agent findings.";

pub fn placeholder_findings() -> Vec<Differential> {
    [
        (
            "Clinical presentation under review",
            "Differential diagnosis was not returned by the analyzer.",
        ),
        (
            "Further diagnostic workup recommended",
            "Correlate with physical examination and laboratory findings.",
        ),
    ]
    .into_iter()
    .map(|(name, rationale)| Differential {
        name: name.to_string(),
        rationale: rationale.to_string(),
        icd10cm_code: None,
    })
    .collect()
}

pub fn placeholder_references() -> Vec<Reference> {
    [
        "Clinical practice guidelines for the presenting symptoms",
        "Systematic reviews on differential diagnosis in primary care",
    ]
    .into_iter()
    .map(|title| Reference {
        title: title.to_string(),
        pmid: None,
        summary: None,
    })
    .collect()
}

pub fn placeholder_cases() -> Vec<SimilarCase> {
    vec![SimilarCase {
        name: "No similar cases retrieved".to_string(),
        score: None,
        description: "Case matching did not return comparable presentations.".to_string(),
        code: None,
    }]
}

pub fn placeholder_treatment_plan() -> TreatmentPlan {
    TreatmentPlan {
        drug: vec![Treatment {
            name: "Pharmacotherapy pending clinical assessment".to_string(),
            class: None,
            rationale: Some("Medication choice depends on confirmed diagnosis.".to_string()),
            source: None,
        }],
        non_drug: vec![Treatment {
            name: "Consult healthcare provider".to_string(),
            class: Some("Clinical Assessment".to_string()),
            rationale: Some(
                "Treatment options should be determined by a licensed physician.".to_string(),
            ),
            source: Some("Clinical Guidelines".to_string()),
        }],
    }
}

pub fn placeholder_recommendations() -> Vec<String> {
    vec![
        "Follow up with the treating physician".to_string(),
        "Monitor symptoms and seek care if they worsen".to_string(),
    ]
}
