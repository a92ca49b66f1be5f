//! Analysis run orchestration.
//!
//! This module drives one analysis of the current case:
//! - Per-agent mode: every selected agent is requested concurrently and
//!   each response lands in the store as it arrives
//! - Combined mode: a single `analyze` call whose response carries one
//!   block per agent under its report key

use crate::analysis::{all_completed, missing_agents, progress_percent, StatusCounts};
use crate::api::AnalysisBackend;
use crate::error::ApiError;
use crate::models::{AgentName, AgentStatus, PatientCase, StatsUpdate};
use crate::store::{AgentTicket, SessionStore};
use anyhow::{bail, Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Agents to request, in display order.
    pub agents: Vec<AgentName>,
    /// Use the combined `analyze` endpoint.
    pub combined: bool,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            agents: AgentName::ORDER.to_vec(),
            combined: false,
            show_progress: false,
        }
    }
}

/// What happened during a run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Agents whose request failed, with the upstream error unchanged.
    pub failures: Vec<(AgentName, ApiError)>,
    /// The run was interrupted and its results cleared.
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }
}

/// Runs the selected agents against a backend and records the results.
pub struct AnalysisRunner<'a, B: AnalysisBackend> {
    backend: &'a B,
    options: RunOptions,
}

impl<'a, B: AnalysisBackend> AnalysisRunner<'a, B> {
    pub fn new(backend: &'a B, options: RunOptions) -> Self {
        Self { backend, options }
    }

    /// Analyze the store's current case.
    ///
    /// `cancel` resolving ends the run early: results are cleared and any
    /// response still in flight is dropped.
    pub async fn run<C>(&self, store: &mut SessionStore, cancel: C) -> Result<RunOutcome>
    where
        C: Future<Output = ()>,
    {
        if store.analysis_in_progress() {
            bail!("An analysis is already in progress");
        }

        let case = store
            .current_case()
            .cloned()
            .context("No patient case to analyze")?;

        info!(
            "Analyzing case {} with {} agent(s){}",
            case.patient_id,
            self.options.agents.len(),
            if self.options.combined { " (combined)" } else { "" }
        );

        let progress_bar = self.progress_bar();
        let start = Instant::now();

        store.clear_results();
        store.set_analysis_in_progress(true);
        debug!("Run started in results epoch {}", store.results_epoch());

        let mut outcome = if self.options.combined {
            self.run_combined(store, &case, cancel, progress_bar.as_ref())
                .await
        } else {
            self.run_per_agent(store, &case, cancel, progress_bar.as_ref())
                .await
        };

        outcome.elapsed = start.elapsed();

        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }

        self.finish(store, &outcome);
        Ok(outcome)
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }

        let pb = ProgressBar::new(self.options.agents.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }

    async fn run_per_agent<C>(
        &self,
        store: &mut SessionStore,
        case: &PatientCase,
        cancel: C,
        progress_bar: Option<&ProgressBar>,
    ) -> RunOutcome
    where
        C: Future<Output = ()>,
    {
        let mut outcome = RunOutcome::default();
        let mut pending = FuturesUnordered::new();

        for &agent in &self.options.agents {
            let ticket = store.dispatch(agent);
            store.update_agent_result(agent, AgentStatus::Running, None);
            debug!("Dispatched {} (epoch {})", agent, ticket.epoch);

            let backend = self.backend;
            pending.push(async move { (ticket, backend.run_agent(agent, case).await) });
        }
        update_progress(store, self.options.agents.len());

        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    cancel_run(store, &mut outcome);
                    break;
                }
                next = pending.next() => {
                    let Some((ticket, response)) = next else {
                        break;
                    };
                    self.apply(store, ticket, response, &mut outcome);
                    if let Some(pb) = progress_bar {
                        pb.inc(1);
                        pb.set_message(ticket.agent.display_name());
                    }
                }
            }
        }

        outcome
    }

    async fn run_combined<C>(
        &self,
        store: &mut SessionStore,
        case: &PatientCase,
        cancel: C,
        progress_bar: Option<&ProgressBar>,
    ) -> RunOutcome
    where
        C: Future<Output = ()>,
    {
        let mut outcome = RunOutcome::default();

        let tickets: Vec<AgentTicket> = self
            .options
            .agents
            .iter()
            .map(|&agent| {
                let ticket = store.dispatch(agent);
                store.update_agent_result(agent, AgentStatus::Running, None);
                ticket
            })
            .collect();
        update_progress(store, tickets.len());

        let response = tokio::select! {
            biased;
            _ = cancel => {
                cancel_run(store, &mut outcome);
                return outcome;
            }
            response = self.backend.analyze(case) => response,
        };

        match response {
            Ok(body) => {
                for ticket in tickets {
                    let block = body.get(ticket.agent.report_key()).cloned();
                    let result = block.ok_or_else(|| ApiError::Decode {
                        endpoint: "analyze".to_string(),
                        message: format!("response has no '{}' block", ticket.agent.report_key()),
                    });
                    self.apply(store, ticket, result, &mut outcome);
                }
            }
            Err(e) => {
                warn!("Combined analysis failed: {}", e);
                for ticket in tickets {
                    store.resolve(ticket, AgentStatus::Error, None);
                }
                update_progress(store, self.options.agents.len());
                // One upstream error covers every agent; report it once.
                if let Some(&first) = self.options.agents.first() {
                    outcome.failures.push((first, e));
                }
            }
        }

        if let Some(pb) = progress_bar {
            pb.set_position(self.options.agents.len() as u64);
        }

        outcome
    }

    fn apply(
        &self,
        store: &mut SessionStore,
        ticket: AgentTicket,
        response: Result<Value, ApiError>,
        outcome: &mut RunOutcome,
    ) {
        match response {
            Ok(payload) => {
                if store.resolve(ticket, AgentStatus::Completed, Some(payload)) {
                    info!("{} completed", ticket.agent.display_name());
                }
            }
            Err(e) => {
                if store.resolve(ticket, AgentStatus::Error, None) {
                    warn!("{} failed: {}", ticket.agent.display_name(), e);
                    outcome.failures.push((ticket.agent, e));
                }
            }
        }

        update_progress(store, self.options.agents.len());
    }

    fn finish(&self, store: &mut SessionStore, outcome: &RunOutcome) {
        store.set_analysis_in_progress(false);

        let total = store.stats().total_analysis_time + outcome.elapsed.as_secs_f64();
        store.update_stats(StatsUpdate {
            active_agents: Some(0),
            total_analysis_time: Some(total),
            ..StatsUpdate::default()
        });

        if outcome.cancelled {
            info!("Analysis cancelled after {:.1}s", outcome.elapsed.as_secs_f64());
            return;
        }

        store.increment_cases_analyzed();
        if all_completed(store.agent_results(), &self.options.agents) {
            store.increment_completed_cases();
        }

        let missing = missing_agents(store.agent_results(), &self.options.agents);
        if !missing.is_empty() {
            warn!("No result recorded for: {:?}", missing);
        }

        info!(
            "Analysis finished in {:.1}s ({} failed)",
            outcome.elapsed.as_secs_f64(),
            outcome.failures.len()
        );
    }
}

fn update_progress(store: &mut SessionStore, expected: usize) {
    let counts = StatusCounts::from_results(store.agent_results());
    let progress = progress_percent(store.agent_results(), expected);
    store.update_stats(StatsUpdate {
        active_agents: Some(counts.active() as u32),
        progress: Some(progress),
        ..StatsUpdate::default()
    });
}

fn cancel_run(store: &mut SessionStore, outcome: &mut RunOutcome) {
    warn!("Interrupted; discarding in-flight agent results");
    store.clear_results();
    store.update_stats(StatsUpdate {
        progress: Some(0),
        ..StatsUpdate::default()
    });
    outcome.cancelled = true;
}

/// Resolves when the user presses Ctrl-C. Never resolves if the signal
/// handler can't be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Medications, Urgency};
    use crate::store::MemoryStatsStorage;
    use serde_json::json;
    use std::collections::HashSet;

    /// Backend answering from canned payloads; agents in `failing` get a
    /// 502 instead.
    struct FakeBackend {
        failing: HashSet<AgentName>,
        combined: Option<Value>,
    }

    impl FakeBackend {
        fn healthy() -> Self {
            Self {
                failing: HashSet::new(),
                combined: None,
            }
        }

        fn failing(agents: &[AgentName]) -> Self {
            Self {
                failing: agents.iter().copied().collect(),
                combined: None,
            }
        }
    }

    impl AnalysisBackend for FakeBackend {
        async fn run_agent(&self, agent: AgentName, case: &PatientCase) -> Result<Value, ApiError> {
            if self.failing.contains(&agent) {
                return Err(ApiError::Status {
                    endpoint: agent.endpoint().to_string(),
                    status: 502,
                    body: "upstream model unavailable".to_string(),
                });
            }
            Ok(json!({"agent": agent.endpoint(), "patient": case.patient_id}))
        }

        async fn analyze(&self, _case: &PatientCase) -> Result<Value, ApiError> {
            self.combined.clone().ok_or_else(|| ApiError::Status {
                endpoint: "analyze".to_string(),
                status: 500,
                body: "graph failed".to_string(),
            })
        }
    }

    fn make_store() -> SessionStore {
        let mut store = SessionStore::open(MemoryStatsStorage::new());
        store.set_current_case(PatientCase {
            patient_id: "P-7".to_string(),
            age: 61,
            gender: "female".to_string(),
            symptoms: "chest pain, dyspnea".to_string(),
            medical_history: "type 2 diabetes".to_string(),
            current_medications: Medications::List(vec!["metformin".to_string()]),
            urgency: Urgency::Critical,
        });
        store
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_per_agent_run_completes_every_agent() {
        let backend = FakeBackend::healthy();
        let mut store = make_store();

        let outcome = AnalysisRunner::new(&backend, RunOptions::default())
            .run(&mut store, never())
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(store.agent_results().len(), 5);
        assert!(all_completed(store.agent_results(), &AgentName::ORDER));
        assert_eq!(
            store.agent_result(AgentName::Case).unwrap().result,
            Some(json!({"agent": "case-matcher", "patient": "P-7"}))
        );

        let stats = store.stats();
        assert_eq!(stats.cases_analyzed, 1);
        assert_eq!(stats.completed_cases, 1);
        assert_eq!(stats.progress, 100);
        assert_eq!(stats.active_agents, 0);
        assert!(!store.analysis_in_progress());
    }

    #[tokio::test]
    async fn test_failed_agent_keeps_upstream_error() {
        let backend = FakeBackend::failing(&[AgentName::Literature]);
        let mut store = make_store();

        let outcome = AnalysisRunner::new(&backend, RunOptions::default())
            .run(&mut store, never())
            .await
            .unwrap();

        assert_eq!(outcome.failures.len(), 1);
        let (agent, err) = &outcome.failures[0];
        assert_eq!(*agent, AgentName::Literature);
        assert!(matches!(err, ApiError::Status { status: 502, .. }));

        assert_eq!(
            store.agent_result(AgentName::Literature).unwrap().status,
            AgentStatus::Error
        );
        assert_eq!(store.stats().cases_analyzed, 1);
        assert_eq!(store.stats().completed_cases, 0);
    }

    #[tokio::test]
    async fn test_selected_agents_only() {
        let backend = FakeBackend::healthy();
        let mut store = make_store();
        let options = RunOptions {
            agents: vec![AgentName::Symptom, AgentName::Summary],
            ..RunOptions::default()
        };

        let outcome = AnalysisRunner::new(&backend, options)
            .run(&mut store, never())
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(store.agent_results().len(), 2);
        assert!(store.agent_result(AgentName::Treatment).is_none());
        assert_eq!(store.stats().completed_cases, 1);
    }

    #[tokio::test]
    async fn test_cancel_clears_results() {
        let backend = FakeBackend::healthy();
        let mut store = make_store();
        let epoch = store.results_epoch();

        let outcome = AnalysisRunner::new(&backend, RunOptions::default())
            .run(&mut store, std::future::ready(()))
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert!(store.agent_results().is_empty());
        assert!(store.results_epoch() > epoch + 1);
        assert_eq!(store.stats().cases_analyzed, 0);
        assert!(!store.analysis_in_progress());
        assert!(store.current_case().is_some());
    }

    #[tokio::test]
    async fn test_combined_run_splits_by_report_key() {
        let backend = FakeBackend {
            failing: HashSet::new(),
            combined: Some(json!({
                "symptom_analysis": {"differential_diagnoses": []},
                "case_matcher": {"matched_cases": []},
                "summary": {"patient_summary": "stable"}
            })),
        };
        let mut store = make_store();
        let options = RunOptions {
            combined: true,
            ..RunOptions::default()
        };

        let outcome = AnalysisRunner::new(&backend, options)
            .run(&mut store, never())
            .await
            .unwrap();

        assert_eq!(
            store.agent_result(AgentName::Summary).unwrap().result,
            Some(json!({"patient_summary": "stable"}))
        );
        let failed: Vec<AgentName> = outcome.failures.iter().map(|(a, _)| *a).collect();
        assert_eq!(failed, vec![AgentName::Literature, AgentName::Treatment]);
        assert_eq!(store.stats().completed_cases, 0);
    }

    #[tokio::test]
    async fn test_combined_failure_marks_every_agent() {
        let backend = FakeBackend::healthy();
        let mut store = make_store();
        let options = RunOptions {
            combined: true,
            ..RunOptions::default()
        };

        let outcome = AnalysisRunner::new(&backend, options)
            .run(&mut store, never())
            .await
            .unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert!(store
            .agent_results()
            .iter()
            .all(|r| r.status == AgentStatus::Error));
        assert_eq!(store.stats().progress, 100);
    }

    #[test]
    fn test_run_without_case_is_an_error() {
        let backend = FakeBackend::healthy();
        let mut store = SessionStore::open(MemoryStatsStorage::new());

        let result = tokio_test::block_on(
            AnalysisRunner::new(&backend, RunOptions::default()).run(&mut store, never()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_refuses_to_start_while_in_progress() {
        let backend = FakeBackend::healthy();
        let mut store = make_store();
        store.set_analysis_in_progress(true);

        let result = tokio_test::block_on(
            AnalysisRunner::new(&backend, RunOptions::default()).run(&mut store, never()),
        );

        assert!(result.is_err());
        assert!(store.agent_results().is_empty());
        assert_eq!(store.stats().cases_analyzed, 0);
    }

    #[test]
    fn test_analysis_time_accumulates() {
        let backend = FakeBackend::healthy();
        let mut store = make_store();
        store.update_stats(StatsUpdate {
            total_analysis_time: Some(12.5),
            ..StatsUpdate::default()
        });

        tokio_test::block_on(
            AnalysisRunner::new(&backend, RunOptions::default()).run(&mut store, never()),
        )
        .unwrap();

        assert!(store.stats().total_analysis_time >= 12.5);
        assert_eq!(store.stats().cases_analyzed, 1);
    }
}
