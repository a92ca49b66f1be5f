//! Session store: the single owner of auth identity, the active case,
//! agent results and usage stats.
//!
//! Every field is private; callers read through accessors and change
//! state only through the mutators below, which keep the one-entry-per-
//! agent invariant. Mutators never fail. After each one the stats are
//! written to the backing [`StatsStorage`]; a write failure is logged and
//! otherwise ignored.

pub mod persistence;

pub use persistence::{FileStatsStorage, StatsStorage, DEFAULT_STORAGE_KEY};

#[cfg(test)]
pub use persistence::MemoryStatsStorage;

use crate::models::{
    AgentName, AgentResult, AgentStatus, PatientCase, Session, Stats, StatsUpdate, User,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

/// Proof that an agent was dispatched during a given results epoch.
///
/// Responses carrying a ticket from before the last `clear_results` are
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTicket {
    pub agent: AgentName,
    pub epoch: u64,
}

pub struct SessionStore {
    user: Option<User>,
    session: Option<Session>,
    current_case: Option<PatientCase>,
    agent_results: Vec<AgentResult>,
    stats: Stats,
    analysis_in_progress: bool,
    results_epoch: u64,
    storage: Box<dyn StatsStorage>,
}

impl SessionStore {
    /// Fresh load: restore persisted stats, everything else starts empty.
    pub fn open(storage: impl StatsStorage + 'static) -> Self {
        let stats = match storage.load() {
            Ok(Some(stats)) => {
                debug!("Restored persisted stats: {:?}", stats);
                stats
            }
            Ok(None) => Stats::default(),
            Err(e) => {
                warn!("Failed to load persisted stats, starting from zero: {}", e);
                Stats::default()
            }
        };

        Self {
            user: None,
            session: None,
            current_case: None,
            agent_results: Vec::new(),
            stats,
            analysis_in_progress: false,
            results_epoch: 0,
            storage: Box::new(storage),
        }
    }

    // ── Read access ─────────────────────────────────────────

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn current_case(&self) -> Option<&PatientCase> {
        self.current_case.as_ref()
    }

    /// Agent results in first-seen order.
    pub fn agent_results(&self) -> &[AgentResult] {
        &self.agent_results
    }

    pub fn agent_result(&self, agent: AgentName) -> Option<&AgentResult> {
        self.agent_results.iter().find(|r| r.agent_name == agent)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn analysis_in_progress(&self) -> bool {
        self.analysis_in_progress
    }

    pub fn results_epoch(&self) -> u64 {
        self.results_epoch
    }

    // ── Auth ────────────────────────────────────────────────

    pub fn set_auth(&mut self, user: Option<User>, session: Option<Session>) {
        self.user = user;
        self.session = session;
        self.persist();
    }

    pub fn clear_auth(&mut self) {
        self.user = None;
        self.session = None;
        self.persist();
    }

    // ── Stats ───────────────────────────────────────────────

    pub fn update_stats(&mut self, update: StatsUpdate) {
        self.stats.merge(update);
        self.persist();
    }

    pub fn increment_completed_cases(&mut self) {
        self.stats.completed_cases += 1;
        self.persist();
    }

    pub fn increment_cases_analyzed(&mut self) {
        self.stats.cases_analyzed += 1;
        self.persist();
    }

    // ── Case and results ────────────────────────────────────

    /// Replace the active case wholesale. Field validation happens in
    /// `intake` before this is called.
    pub fn set_current_case(&mut self, case: PatientCase) {
        self.current_case = Some(case);
        self.persist();
    }

    /// Upsert by agent name: an existing entry is replaced where it sits,
    /// a new one is appended. The timestamp is always fresh.
    pub fn update_agent_result(
        &mut self,
        agent: AgentName,
        status: AgentStatus,
        result: Option<Value>,
    ) {
        let entry = AgentResult {
            agent_name: agent,
            status,
            result,
            timestamp: Utc::now(),
        };

        match self.agent_results.iter_mut().find(|r| r.agent_name == agent) {
            Some(existing) => *existing = entry,
            None => self.agent_results.push(entry),
        }

        self.persist();
    }

    /// Empty the results and start a new epoch. Stats and the current case
    /// are untouched.
    pub fn clear_results(&mut self) {
        self.agent_results.clear();
        self.results_epoch += 1;
        debug!("Cleared agent results, epoch now {}", self.results_epoch);
        self.persist();
    }

    pub fn set_analysis_in_progress(&mut self, in_progress: bool) {
        self.analysis_in_progress = in_progress;
        self.persist();
    }

    /// Mark an agent pending and hand out a ticket for its response.
    pub fn dispatch(&mut self, agent: AgentName) -> AgentTicket {
        self.update_agent_result(agent, AgentStatus::Pending, None);
        AgentTicket {
            agent,
            epoch: self.results_epoch,
        }
    }

    /// Apply a response for a dispatched agent. Returns `false` and leaves
    /// the results alone when the ticket predates the last clear.
    pub fn resolve(
        &mut self,
        ticket: AgentTicket,
        status: AgentStatus,
        result: Option<Value>,
    ) -> bool {
        if ticket.epoch != self.results_epoch {
            debug!(
                "Discarding stale {} response (epoch {} != {})",
                ticket.agent, ticket.epoch, self.results_epoch
            );
            return false;
        }

        self.update_agent_result(ticket.agent, status, result);
        true
    }

    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.stats) {
            warn!("Failed to persist stats: {}", e);
        }
    }
}
