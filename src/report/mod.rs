//! Report output.
//!
//! The dashboard (Markdown or JSON) is rendered locally from normalized
//! views; the PDF export payload is assembled here and rendered remotely.

pub mod generator;
pub mod pdf;

pub use generator::{
    generate_json_report, generate_markdown_report, Dashboard, DashboardMetadata, FailedAgent,
};
pub use pdf::ReportPayload;
