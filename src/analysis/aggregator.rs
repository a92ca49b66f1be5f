//! Agent status aggregation.
//!
//! This module summarizes the agent result collection: how many agents
//! sit in each status, how far a run has progressed, and which selected
//! agents have not reported at all.

use crate::models::{AgentName, AgentResult, AgentStatus};

/// Number of agents in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    /// Count the statuses of a result collection.
    pub fn from_results(results: &[AgentResult]) -> Self {
        let mut counts = Self::default();

        for result in results {
            match result.status {
                AgentStatus::Pending => counts.pending += 1,
                AgentStatus::Running => counts.running += 1,
                AgentStatus::Completed => counts.completed += 1,
                AgentStatus::Error => counts.error += 1,
            }
        }

        counts
    }

    pub fn finished(&self) -> usize {
        self.completed + self.error
    }

    /// Agents still waiting on a response.
    pub fn active(&self) -> usize {
        self.pending + self.running
    }
}

/// Percentage of `expected` agents that have finished, 0-100.
pub fn progress_percent(results: &[AgentResult], expected: usize) -> u32 {
    if expected == 0 {
        return 100;
    }

    let finished = StatusCounts::from_results(results).finished().min(expected);
    ((finished * 100) / expected) as u32
}

/// Whether every selected agent completed successfully.
pub fn all_completed(results: &[AgentResult], selected: &[AgentName]) -> bool {
    !selected.is_empty()
        && selected.iter().all(|agent| {
            results
                .iter()
                .any(|r| r.agent_name == *agent && r.status == AgentStatus::Completed)
        })
}

/// Selected agents that have no entry in the collection.
pub fn missing_agents(results: &[AgentResult], selected: &[AgentName]) -> Vec<AgentName> {
    selected
        .iter()
        .filter(|agent| !results.iter().any(|r| r.agent_name == **agent))
        .copied()
        .collect()
}

/// One line per agent in display order, e.g. `✅ Symptom Analyzer: completed`.
pub fn status_lines(results: &[AgentResult]) -> Vec<String> {
    AgentName::ORDER
        .iter()
        .filter_map(|agent| results.iter().find(|r| r.agent_name == *agent))
        .map(|r| {
            let icon = match r.status {
                AgentStatus::Pending => "⏳",
                AgentStatus::Running => "🔄",
                AgentStatus::Completed => "✅",
                AgentStatus::Error => "❌",
            };
            format!("{} {}: {}", icon, r.agent_name.display_name(), r.status)
        })
        .collect()
}
