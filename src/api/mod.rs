//! Clients for the remote collaborators: the agent analysis API and the
//! auth service.

pub mod auth;
pub mod client;
#[cfg(test)]
pub(crate) mod test_server;

pub use auth::AuthClient;
pub use client::AnalysisClient;

use crate::error::ApiError;
use crate::models::{AgentName, PatientCase};
use serde_json::Value;

/// The part of the analysis API the runner needs. Implemented by
/// [`AnalysisClient`]; tests substitute their own.
#[allow(async_fn_in_trait)]
pub trait AnalysisBackend {
    /// Run a single agent and return its raw payload.
    async fn run_agent(&self, agent: AgentName, case: &PatientCase) -> Result<Value, ApiError>;

    /// Run every agent in one call; the response holds one block per
    /// agent under its report key.
    async fn analyze(&self, case: &PatientCase) -> Result<Value, ApiError>;
}
