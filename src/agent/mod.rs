//! Agent orchestration.
//!
//! This module runs the remote analysis agents for the current case and
//! applies their responses to the session store.

pub mod runner;

pub use runner::{ctrl_c, AnalysisRunner, RunOptions};
