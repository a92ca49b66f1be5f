//! Data models for the intake dashboard.
//!
//! This module contains the core data structures shared by the store,
//! the normalizer and the API layer: identity, the patient case, agent
//! results and the aggregate usage statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The signed-in actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Credential issued by the auth service, paired with a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// What the auth service hands back on login or signup.
///
/// Signup may return no session when the provider requires email
/// confirmation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: User,
    pub session: Option<Session>,
}

/// Triage urgency of a case.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Low => write!(f, "Low"),
            Urgency::Medium => write!(f, "Medium"),
            Urgency::High => write!(f, "High"),
            Urgency::Critical => write!(f, "Critical"),
        }
    }
}

impl FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            "critical" => Ok(Urgency::Critical),
            other => Err(format!(
                "unknown urgency '{}' (expected low, medium, high or critical)",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Urgency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Urgency {
    /// Returns an emoji badge for the urgency.
    pub fn emoji(&self) -> &'static str {
        match self {
            Urgency::Low => "🟢",
            Urgency::Medium => "🟡",
            Urgency::High => "🟠",
            Urgency::Critical => "🔴",
        }
    }
}

/// Current medications: the form accepts either free text or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Medications {
    List(Vec<String>),
    Text(String),
}

impl Default for Medications {
    fn default() -> Self {
        Medications::Text(String::new())
    }
}

impl Medications {
    /// Comma-joined form used for display.
    pub fn joined(&self) -> String {
        match self {
            Medications::List(items) => items.join(", "),
            Medications::Text(text) => text.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Medications::List(items) => items.iter().all(|m| m.trim().is_empty()),
            Medications::Text(text) => text.trim().is_empty(),
        }
    }
}

/// The single active patient case.
///
/// Serialized with camelCase keys, which is also the request body the
/// analysis API accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientCase {
    pub patient_id: String,
    pub age: u32,
    pub gender: String,
    /// Comma-joined, at least one entry.
    pub symptoms: String,
    /// Comma-joined, may be empty.
    pub medical_history: String,
    pub current_medications: Medications,
    pub urgency: Urgency,
}

impl PatientCase {
    /// Individual symptom entries.
    pub fn symptom_list(&self) -> Vec<&str> {
        split_entries(&self.symptoms)
    }
}

/// Split a comma-joined field into trimmed, non-empty entries.
pub fn split_entries(joined: &str) -> Vec<&str> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// One of the five remote analysis agents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AgentName {
    Symptom,
    Literature,
    Case,
    Treatment,
    Summary,
}

impl AgentName {
    /// Fixed display order for rendering.
    pub const ORDER: [AgentName; 5] = [
        AgentName::Symptom,
        AgentName::Literature,
        AgentName::Case,
        AgentName::Treatment,
        AgentName::Summary,
    ];

    /// Path segment of the per-agent endpoint.
    pub fn endpoint(&self) -> &'static str {
        match self {
            AgentName::Symptom => "symptom-analyzer",
            AgentName::Literature => "literature",
            AgentName::Case => "case-matcher",
            AgentName::Treatment => "treatment",
            AgentName::Summary => "summary",
        }
    }

    /// Key of this agent's block in the combined analysis response and
    /// in the PDF export payload.
    pub fn report_key(&self) -> &'static str {
        match self {
            AgentName::Symptom => "symptom_analysis",
            AgentName::Literature => "literature",
            AgentName::Case => "case_matcher",
            AgentName::Treatment => "treatment",
            AgentName::Summary => "summary",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentName::Symptom => "Symptom Analyzer",
            AgentName::Literature => "Literature Review",
            AgentName::Case => "Case Matcher",
            AgentName::Treatment => "Treatment Planner",
            AgentName::Summary => "Clinical Summary",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentName::Symptom => write!(f, "symptom"),
            AgentName::Literature => write!(f, "literature"),
            AgentName::Case => write!(f, "case"),
            AgentName::Treatment => write!(f, "treatment"),
            AgentName::Summary => write!(f, "summary"),
        }
    }
}

/// Lifecycle of one agent's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Pending => write!(f, "pending"),
            AgentStatus::Running => write!(f, "running"),
            AgentStatus::Completed => write!(f, "completed"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// Latest known state of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub agent_name: AgentName,
    pub status: AgentStatus,
    /// Raw upstream payload, present only once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate usage counters; the only state that survives a reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub active_agents: u32,
    pub completed_cases: u64,
    pub cases_analyzed: u64,
    /// Percent, 0-100.
    pub progress: u32,
    /// Seconds.
    pub total_analysis_time: f64,
}

/// Partial update for [`Stats`]; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsUpdate {
    pub active_agents: Option<u32>,
    pub completed_cases: Option<u64>,
    pub cases_analyzed: Option<u64>,
    pub progress: Option<u32>,
    pub total_analysis_time: Option<f64>,
}

impl Stats {
    /// Shallow-merge the fields present in `update`.
    pub fn merge(&mut self, update: StatsUpdate) {
        if let Some(v) = update.active_agents {
            self.active_agents = v;
        }
        if let Some(v) = update.completed_cases {
            self.completed_cases = v;
        }
        if let Some(v) = update.cases_analyzed {
            self.cases_analyzed = v;
        }
        if let Some(v) = update.progress {
            self.progress = v;
        }
        if let Some(v) = update.total_analysis_time {
            self.total_analysis_time = v;
        }
    }
}
