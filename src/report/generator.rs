//! Markdown dashboard generation.
//!
//! This module renders the analysis dashboard (patient details, agent
//! status and one section per completed agent) from normalized views.

use crate::analysis::status_lines;
use crate::models::{AgentName, AgentResult, PatientCase, Stats};
use crate::normalizer::{
    render_completed, AgentView, CaseView, Field, LiteratureView, SummaryView, SymptomView,
    Treatment, TreatmentView,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An agent whose request failed, with the upstream error text.
#[derive(Debug, Clone, Serialize)]
pub struct FailedAgent {
    pub agent: AgentName,
    pub error: String,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetadata {
    pub generated_at: DateTime<Utc>,
    pub api_url: String,
    pub signed_in_as: Option<String>,
    pub agents_requested: Vec<AgentName>,
    pub duration_seconds: f64,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub patient: Option<PatientCase>,
    pub status: Vec<String>,
    pub sections: Vec<AgentView>,
    pub failures: Vec<FailedAgent>,
    pub stats: Stats,
}

impl Dashboard {
    /// Build the dashboard from the store's current contents.
    pub fn new(
        metadata: DashboardMetadata,
        patient: Option<&PatientCase>,
        results: &[AgentResult],
        failures: Vec<FailedAgent>,
        stats: &Stats,
    ) -> Self {
        Self {
            metadata,
            patient: patient.cloned(),
            status: status_lines(results),
            sections: render_completed(results),
            failures,
            stats: stats.clone(),
        }
    }
}

/// Generate the complete Markdown dashboard.
pub fn generate_markdown_report(dashboard: &Dashboard) -> String {
    let mut output = String::new();

    output.push_str("# MedsAI Analysis Report\n\n");

    if let Some(ref patient) = dashboard.patient {
        output.push_str(&generate_patient_section(patient));
    }

    output.push_str(&generate_metadata_section(&dashboard.metadata));
    output.push_str(&generate_table_of_contents(dashboard));
    output.push_str(&generate_status_section(dashboard));

    if dashboard.sections.is_empty() {
        output.push_str("No completed agent results to display.\n\n");
    }

    for view in &dashboard.sections {
        output.push_str(&generate_agent_section(view));
    }

    output.push_str(&generate_stats_section(&dashboard.stats));
    output.push_str(&generate_footer());

    output
}

/// Generate a JSON dashboard.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

fn anchor(title: &str) -> String {
    title.replace([' ', '/', '.'], "-").to_lowercase()
}

fn placeholder_note<T>(field: &Field<T>) -> &'static str {
    if field.is_placeholder() {
        "*Not returned by the agent; showing default guidance.*\n\n"
    } else {
        ""
    }
}

fn generate_patient_section(patient: &PatientCase) -> String {
    let mut section = String::new();

    section.push_str("## Patient\n\n");
    section.push_str(&format!("- **Patient ID:** {}\n", patient.patient_id));
    section.push_str(&format!(
        "- **Age:** {} | **Gender:** {} | **Urgency:** {} {}\n",
        patient.age,
        if patient.gender.is_empty() { "N/A" } else { patient.gender.as_str() },
        patient.urgency.emoji(),
        patient.urgency
    ));
    section.push_str(&format!("- **Symptoms:** {}\n", patient.symptoms));
    if !patient.medical_history.is_empty() {
        section.push_str(&format!(
            "- **Medical History:** {}\n",
            patient.medical_history
        ));
    }
    if !patient.current_medications.is_empty() {
        section.push_str(&format!(
            "- **Current Medications:** {}\n",
            patient.current_medications.joined()
        ));
    }
    section.push('\n');

    section
}

fn generate_metadata_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Analysis API:** {}\n", metadata.api_url));
    if let Some(ref who) = metadata.signed_in_as {
        section.push_str(&format!("- **Signed in as:** {}\n", who));
    }
    let agents: Vec<_> = metadata
        .agents_requested
        .iter()
        .map(|a| a.display_name())
        .collect();
    section.push_str(&format!("- **Agents:** {}\n", agents.join(", ")));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

fn generate_table_of_contents(dashboard: &Dashboard) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Agent Status](#agent-status)\n");
    for view in &dashboard.sections {
        let title = view.agent().display_name();
        toc.push_str(&format!("- [{}](#{})\n", title, anchor(title)));
    }
    toc.push_str("- [Usage Statistics](#usage-statistics)\n\n");

    toc
}

fn generate_status_section(dashboard: &Dashboard) -> String {
    let mut section = String::new();

    section.push_str("## Agent Status\n\n");
    for line in &dashboard.status {
        section.push_str(&format!("- {}\n", line));
    }
    section.push('\n');

    if !dashboard.failures.is_empty() {
        section.push_str("### Failed Agents\n\n");
        for failure in &dashboard.failures {
            section.push_str(&format!(
                "- **{}:** {}\n",
                failure.agent.display_name(),
                failure.error
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_agent_section(view: &AgentView) -> String {
    let mut section = format!("## {}\n\n", view.agent().display_name());

    section.push_str(&match view {
        AgentView::Symptom(v) => generate_symptom_section(v),
        AgentView::Literature(v) => generate_literature_section(v),
        AgentView::Case(v) => generate_case_section(v),
        AgentView::Treatment(v) => generate_treatment_section(v),
        AgentView::Summary(v) => generate_summary_section(v),
    });

    section.push_str("---\n\n");
    section
}

fn generate_symptom_section(view: &SymptomView) -> String {
    let mut section = String::new();

    let confidence = view.confidence.value();
    section.push_str(&format!("**Confidence:** {}%", confidence.percent));
    if let Some(ref risk) = confidence.risk_level {
        section.push_str(&format!(" (risk: {})", risk));
    }
    section.push_str("\n\n");

    section.push_str("### Differential Diagnosis\n\n");
    section.push_str(placeholder_note(&view.findings));
    for (i, finding) in view.findings.value().iter().enumerate() {
        section.push_str(&format!("{}. **{}**", i + 1, finding.name));
        if let Some(ref code) = finding.icd10cm_code {
            section.push_str(&format!(" (`{}`)", code));
        }
        if !finding.rationale.is_empty() {
            section.push_str(&format!(" - {}", finding.rationale));
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn generate_literature_section(view: &LiteratureView) -> String {
    let mut section = String::new();

    section.push_str(placeholder_note(&view.references));
    if view.references.value().is_empty() {
        section.push_str("No references returned.\n\n");
        return section;
    }

    for (i, reference) in view.references.value().iter().enumerate() {
        section.push_str(&format!("{}. {}", i + 1, reference.title));
        if let Some(ref pmid) = reference.pmid {
            section.push_str(&format!(" (PMID: {})", pmid));
        }
        section.push('\n');
        if let Some(ref summary) = reference.summary {
            section.push_str(&format!("   > {}\n", summary));
        }
    }
    section.push('\n');

    section
}

fn generate_case_section(view: &CaseView) -> String {
    let mut section = String::new();

    section.push_str(placeholder_note(&view.cases));
    if view.cases.value().is_empty() {
        section.push_str("No similar cases returned.\n\n");
        return section;
    }

    for (i, case) in view.cases.value().iter().enumerate() {
        section.push_str(&format!("{}. **{}**", i + 1, case.name));
        if let Some(ref code) = case.code {
            section.push_str(&format!(" (`{}`)", code));
        }
        if let Some(score) = case.score {
            section.push_str(&format!(" - {}", score));
        }
        section.push('\n');
        if !case.description.is_empty() {
            section.push_str(&format!("   {}\n", case.description));
        }
    }
    section.push('\n');

    section
}

fn generate_treatment_list(title: &str, treatments: &[Treatment]) -> String {
    let mut list = format!("### {}\n\n", title);

    if treatments.is_empty() {
        list.push_str("None suggested.\n\n");
        return list;
    }

    for (i, t) in treatments.iter().enumerate() {
        list.push_str(&format!("{}. **{}**", i + 1, t.name));
        if let Some(ref class) = t.class {
            list.push_str(&format!(" ({})", class));
        }
        list.push('\n');
        if let Some(ref rationale) = t.rationale {
            list.push_str(&format!("   {}\n", rationale));
        }
        if let Some(ref source) = t.source {
            list.push_str(&format!("   *Source: {}*\n", source));
        }
    }
    list.push('\n');

    list
}

fn generate_treatment_section(view: &TreatmentView) -> String {
    let mut section = String::new();

    section.push_str(placeholder_note(&view.plan));
    let plan = view.plan.value();
    section.push_str(&generate_treatment_list("Drug Treatments", &plan.drug));
    section.push_str(&generate_treatment_list(
        "Non-Drug Interventions",
        &plan.non_drug,
    ));

    section
}

fn generate_summary_section(view: &SummaryView) -> String {
    let mut section = String::new();

    section.push_str("### Patient Summary\n\n");
    section.push_str(view.patient_summary.value());
    section.push_str("\n\n");

    section.push_str("### Clinical Summary\n\n");
    section.push_str(view.clinical_summary.value());
    section.push_str("\n\n");

    section.push_str("### Recommendations\n\n");
    section.push_str(placeholder_note(&view.recommendations));
    for rec in view.recommendations.value() {
        section.push_str(&format!("- {}\n", rec));
    }
    section.push('\n');

    if let Some(ref citations) = view.citations {
        section.push_str("### Citations\n\n");
        for pmid in &citations.pmids {
            section.push_str(&format!("- PMID: {}\n", pmid));
        }
        for source in &citations.sources {
            section.push_str(&format!("- {}\n", source));
        }
        section.push('\n');
    }

    section
}

fn generate_stats_section(stats: &Stats) -> String {
    let mut section = String::new();

    section.push_str("## Usage Statistics\n\n");
    section.push_str("| Cases Analyzed | Completed Cases | Total Analysis Time |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {:.1}s |\n\n",
        stats.cases_analyzed, stats.completed_cases, stats.total_analysis_time
    ));

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(
        "*AI-generated clinical decision support. Not medical advice; verify with a licensed healthcare provider.*\n",
    );

    footer
}
