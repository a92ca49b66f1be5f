//! Analysis bookkeeping.
//!
//! Status aggregation over the agent results held by the store; the
//! runner uses it to keep the progress stats current.

pub mod aggregator;

pub use aggregator::*;
