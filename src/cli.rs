//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::intake::CaseForm;
use crate::models::{AgentName, Medications, Urgency};
use clap::Parser;
use std::path::PathBuf;

/// MedsAI - patient-case intake and multi-agent clinical analysis
///
/// Submit a patient case to the symptom, literature, case-matching,
/// treatment and summary agents, then review the results as a Markdown
/// or JSON dashboard and optionally export a PDF report.
///
/// Examples:
///   medsai --patient-id P-1 --symptoms "cough, fever" --urgency high
///   medsai --case-file case.json --agents symptom,summary --format json
///   medsai --case-file case.json --pdf report.pdf
///   medsai --email dr@example.org --patient-id P-1 --symptoms cough
///   medsai --stats
///   medsai --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Patient identifier
    #[arg(long, value_name = "ID")]
    pub patient_id: Option<String>,

    /// Patient age in years
    #[arg(long)]
    pub age: Option<u32>,

    /// Patient gender
    #[arg(long)]
    pub gender: Option<String>,

    /// Presenting symptoms (comma-separated)
    #[arg(long, value_name = "LIST")]
    pub symptoms: Option<String>,

    /// Relevant medical history (comma-separated)
    #[arg(long, value_name = "LIST")]
    pub history: Option<String>,

    /// Current medications (comma-separated)
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub medications: Option<Vec<String>>,

    /// Case urgency
    #[arg(long, value_name = "LEVEL", ignore_case = true)]
    pub urgency: Option<Urgency>,

    /// Load the case from a JSON file; flags above override its fields
    #[arg(long, value_name = "FILE")]
    pub case_file: Option<PathBuf>,

    /// Agents to run (comma-separated). Default: all five
    #[arg(long, value_name = "AGENTS", value_delimiter = ',')]
    pub agents: Option<Vec<AgentName>>,

    /// Use the combined analyze endpoint instead of one call per agent
    #[arg(long)]
    pub combined: bool,

    /// Analysis API base URL
    #[arg(long, env = "MEDSAI_API_URL", value_name = "URL")]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Auth service URL
    #[arg(long, env = "MEDSAI_AUTH_URL", value_name = "URL")]
    pub auth_url: Option<String>,

    /// Auth service public API key
    #[arg(long, env = "MEDSAI_AUTH_KEY", value_name = "KEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// Sign in with this email before analyzing
    #[arg(long, env = "MEDSAI_EMAIL")]
    pub email: Option<String>,

    /// Password for --email
    #[arg(long, env = "MEDSAI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Create an account with this display name instead of signing in
    #[arg(long, value_name = "NAME", requires = "email")]
    pub signup: Option<String>,

    /// Print the OAuth sign-in URL for a provider (e.g. google) and exit
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Output file path for the dashboard
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also export a PDF report (optionally to FILE)
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = "")]
    pub pdf: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .medsai.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// State file holding persisted usage stats
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Validate the case and print the request payload without calling the API
    #[arg(long)]
    pub dry_run: bool,

    /// Print persisted usage stats and exit
    #[arg(long)]
    pub stats: bool,

    /// Generate a default .medsai.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Where `--pdf` should write, if it was given. An empty value means
    /// the configured default.
    pub fn pdf_path(&self, default: &str) -> Option<PathBuf> {
        self.pdf.as_ref().map(|p| {
            if p.trim().is_empty() {
                PathBuf::from(default)
            } else {
                PathBuf::from(p)
            }
        })
    }

    /// Whether this invocation analyzes a case (as opposed to an
    /// informational mode that exits early).
    pub fn wants_analysis(&self) -> bool {
        !(self.init_config || self.stats || self.provider.is_some())
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if !self.wants_analysis() {
            return Ok(());
        }

        if self.case_file.is_none() && (self.patient_id.is_none() || self.symptoms.is_none()) {
            return Err("Provide --case-file, or both --patient-id and --symptoms".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref agents) = self.agents {
            if agents.is_empty() {
                return Err("--agents needs at least one agent".to_string());
            }
        }

        if self.email.is_some() && self.password.is_none() {
            return Err("--email requires --password (or MEDSAI_PASSWORD)".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref path) = self.case_file {
            if !path.is_file() {
                return Err(format!("Case file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Selected agents, deduplicated, in display order.
    pub fn selected_agents(&self) -> Vec<AgentName> {
        match self.agents {
            Some(ref agents) => AgentName::ORDER
                .iter()
                .filter(|a| agents.contains(a))
                .copied()
                .collect(),
            None => AgentName::ORDER.to_vec(),
        }
    }

    /// Apply the case flags on top of `base` (a loaded case file, or an
    /// empty form).
    pub fn case_form(&self, base: CaseForm) -> CaseForm {
        let mut form = base;

        if let Some(ref id) = self.patient_id {
            form.patient_id = id.clone();
        }
        if let Some(age) = self.age {
            form.age = age;
        }
        if let Some(ref gender) = self.gender {
            form.gender = gender.clone();
        }
        if let Some(ref symptoms) = self.symptoms {
            form.symptoms = symptoms.clone();
        }
        if let Some(ref history) = self.history {
            form.medical_history = history.clone();
        }
        if let Some(ref meds) = self.medications {
            form.current_medications = Some(Medications::List(meds.clone()));
        }
        if let Some(urgency) = self.urgency {
            form.urgency = Some(urgency);
        }

        form
    }
}
