//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.medsai.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".medsai.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Auth service settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Persisted state settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default dashboard output path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "medsai_report.md".to_string()
}

/// Analysis API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the agent API.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_api_timeout")]
    pub timeout_seconds: u64,

    /// Use the combined `analyze` endpoint instead of one call per agent.
    #[serde(default)]
    pub combined: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_seconds: default_api_timeout(),
            combined: false,
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_timeout() -> u64 {
    180 // agents chain LLM and PubMed/BioPortal lookups
}

/// Auth service settings. Auth is skipped entirely without a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth service.
    #[serde(default)]
    pub url: Option<String>,

    /// Public API key sent with every auth request.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_auth_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_seconds: default_auth_timeout(),
        }
    }
}

fn default_auth_timeout() -> u64 {
    30
}

/// Where the stats survive between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON state file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Entry name inside the state file.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            storage_key: default_storage_key(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".medsai/state.json")
}

fn default_storage_key() -> String {
    crate::store::DEFAULT_STORAGE_KEY.to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Where `--pdf` writes when no path is given.
    #[serde(default = "default_pdf_output")]
    pub pdf_output: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            pdf_output: default_pdf_output(),
        }
    }
}

fn default_pdf_output() -> String {
    "analysis_report.pdf".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if args.combined {
            self.api.combined = true;
        }

        if let Some(ref url) = args.auth_url {
            self.auth.url = Some(url.clone());
        }
        if let Some(ref key) = args.auth_key {
            self.auth.api_key = Some(key.clone());
        }

        if let Some(ref path) = args.state_file {
            self.store.state_file = path.clone();
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
