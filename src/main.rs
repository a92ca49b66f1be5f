//! MedsAI - patient-case intake and multi-agent clinical analysis
//!
//! A CLI tool that submits a patient case to a set of remote AI agents
//! and renders their results as a clinician dashboard.
//!
//! Exit codes:
//!   0 - Success (every requested agent completed)
//!   1 - Runtime error (invalid case, connection, config, auth, etc.)
//!   2 - One or more agents failed
//!   130 - Interrupted with Ctrl-C

mod agent;
mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod intake;
mod models;
mod normalizer;
mod report;
mod store;

use anyhow::{Context, Result};
use api::{AnalysisClient, AuthClient};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use intake::CaseForm;
use models::{AgentName, PatientCase};
use report::{Dashboard, DashboardMetadata, FailedAgent, ReportPayload};
use std::path::{Path, PathBuf};
use store::{FileStatsStorage, SessionStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("MedsAI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_app(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .medsai.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the API URL, auth service and state file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns the process exit code.
async fn run_app(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let storage = FileStatsStorage::new(
        config.store.state_file.clone(),
        config.store.storage_key.clone(),
    );
    debug!("Stats persisted to {}", storage.path().display());
    let mut store = SessionStore::open(storage);

    if args.stats {
        print_stats(&store);
        return Ok(0);
    }

    if let Some(ref provider) = args.provider {
        let auth = AuthClient::new(&config.auth)?;
        let redirect = auth.sign_in_with_provider(provider)?;
        println!("🔑 Continue {} sign-in in your browser:", redirect.provider);
        println!("   {}", redirect.url);
        return Ok(0);
    }

    // Step 1: Intake
    let case = match read_case(&args) {
        Ok(case) => case,
        Err(e) => {
            eprintln!("❌ {}", e);
            return Ok(1);
        }
    };

    let agents = args.selected_agents();

    if args.dry_run {
        return handle_dry_run(&case, &agents, &config);
    }

    // Step 2: Sign in
    let auth_client = sign_in(&args, &config, &mut store).await?;

    store.set_current_case(case);

    analyze_and_sign_out(&args, &config, &mut store, auth_client.as_ref(), agents).await
}

/// Analyze the current case, then sign out whatever the outcome.
async fn analyze_and_sign_out(
    args: &Args,
    config: &Config,
    store: &mut SessionStore,
    auth_client: Option<&AuthClient>,
    agents: Vec<AgentName>,
) -> Result<i32> {
    let result = analyze_case(args, config, store, agents).await;
    sign_out(auth_client, store).await;
    result
}

/// Run the agents, write the dashboard and export the PDF if asked.
async fn analyze_case(
    args: &Args,
    config: &Config,
    store: &mut SessionStore,
    agents: Vec<AgentName>,
) -> Result<i32> {
    // Step 3: Run the agents
    let client = AnalysisClient::new(&config.api)?
        .with_access_token(store.session().map(|s| s.access_token.clone()));

    println!(
        "🩺 Analyzing case {}",
        store
            .current_case()
            .map(|c| c.patient_id.as_str())
            .unwrap_or_default()
    );
    println!("   API: {}", config.api.base_url);
    println!(
        "   Agents: {}",
        agents
            .iter()
            .map(|a| a.display_name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "   Mode: {}",
        if config.api.combined {
            "Combined (one call)"
        } else {
            "Per-agent (concurrent)"
        }
    );
    println!("   Timeout: {}s\n", config.api.timeout_seconds);

    let options = agent::RunOptions {
        agents: agents.clone(),
        combined: config.api.combined,
        show_progress: !args.quiet,
    };
    let outcome = agent::AnalysisRunner::new(&client, options)
        .run(store, agent::ctrl_c())
        .await?;

    if outcome.cancelled {
        println!("\n⛔ Analysis interrupted; results discarded.");
        return Ok(130);
    }

    // Step 4: Dashboard
    println!("\n📝 Generating dashboard...");

    let failures: Vec<FailedAgent> = outcome
        .failures
        .iter()
        .map(|(agent, e)| FailedAgent {
            agent: *agent,
            error: e.to_string(),
        })
        .collect();

    let metadata = DashboardMetadata {
        generated_at: Utc::now(),
        api_url: config.api.base_url.clone(),
        signed_in_as: store.user().map(|u| u.email.clone()),
        agents_requested: agents,
        duration_seconds: outcome.elapsed.as_secs_f64(),
    };

    let dashboard = Dashboard::new(
        metadata,
        store.current_case(),
        store.agent_results(),
        failures,
        store.stats(),
    );

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&dashboard)?,
        OutputFormat::Markdown => report::generate_markdown_report(&dashboard),
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write dashboard to {}", output_path.display()))?;

    // Step 5: Optional PDF export
    if let Some(pdf_path) = args.pdf_path(&config.report.pdf_output) {
        export_pdf(&client, store, &pdf_path).await?;
    }

    // Print summary
    println!("\n📊 Agent Status:");
    for line in analysis::status_lines(store.agent_results()) {
        println!("   {}", line);
    }
    println!("   Duration: {:.1}s", outcome.elapsed.as_secs_f64());
    println!(
        "\n✅ Analysis complete! Dashboard saved to: {}",
        output_path.display()
    );

    if !outcome.succeeded() {
        eprintln!(
            "\n⚠️  {} agent(s) failed. See the dashboard for details (exit code 2).",
            outcome.failures.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Build the case from --case-file and the case flags.
fn read_case(args: &Args) -> Result<PatientCase, error::ValidationError> {
    let base = match args.case_file {
        Some(ref path) => CaseForm::from_file(path)?,
        None => CaseForm::default(),
    };

    args.case_form(base).validate()
}

/// Handle --dry-run: print what would be sent, exit.
fn handle_dry_run(
    case: &PatientCase,
    agents: &[AgentName],
    config: &Config,
) -> Result<i32> {
    println!("\n🔍 Dry run: case validated (no API calls)...\n");

    let payload = serde_json::to_string_pretty(case).context("Failed to serialize case")?;
    println!("{}\n", payload);

    if config.api.combined {
        println!("   Would POST once to {}/analyze", config.api.base_url);
    } else {
        for agent in agents {
            println!(
                "   Would POST to {}/{}",
                config.api.base_url.trim_end_matches('/'),
                agent.endpoint()
            );
        }
    }

    println!("\n✅ Dry run complete. No API calls were made.");
    Ok(0)
}

/// Print persisted usage stats.
fn print_stats(store: &SessionStore) {
    let stats = store.stats();
    println!("📈 Usage statistics:");
    println!("   Cases analyzed: {}", stats.cases_analyzed);
    println!("   Completed cases: {}", stats.completed_cases);
    println!("   Total analysis time: {:.1}s", stats.total_analysis_time);
    println!("   Last run progress: {}%", stats.progress);
}

/// Sign in (or sign up) when credentials were given. Returns the client
/// so the session can be closed at the end of the run.
async fn sign_in(
    args: &Args,
    config: &Config,
    store: &mut SessionStore,
) -> Result<Option<AuthClient>> {
    let (Some(email), Some(password)) = (args.email.as_deref(), args.password.as_deref()) else {
        return Ok(None);
    };

    let client = AuthClient::new(&config.auth)?;

    let auth = match args.signup {
        Some(ref name) => client
            .signup(email, password, name)
            .await
            .context("Sign-up failed")?,
        None => client
            .login(email, password)
            .await
            .context("Sign-in failed")?,
    };

    store.set_auth(Some(auth.user), auth.session);

    match store.user() {
        Some(user) if store.session().is_some() => println!("🔓 Signed in as {}", user.name),
        Some(user) => println!(
            "📧 Account created for {}. Confirm your email, then sign in.",
            user.email
        ),
        None => {}
    }

    Ok(Some(client))
}

async fn sign_out(client: Option<&AuthClient>, store: &mut SessionStore) {
    if !store.is_authenticated() {
        return;
    }
    if let (Some(client), Some(session)) = (client, store.session()) {
        if let Err(e) = client.sign_out(session).await {
            warn!("Sign-out failed: {}", e);
        }
    }
    store.clear_auth();
    info!("Signed out");
}

/// Assemble the PDF payload and write the rendered document.
async fn export_pdf(client: &AnalysisClient, store: &SessionStore, path: &Path) -> Result<()> {
    let payload = match ReportPayload::from_store(store) {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("⚠️  {}", e);
            return Ok(());
        }
    };

    println!("📄 Exporting PDF ({} section(s))...", payload.section_count());
    let bytes = client
        .generate_pdf(&payload)
        .await
        .context("PDF export failed")?;

    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write PDF to {}", path.display()))?;
    println!("   Saved to: {}", path.display());
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Session, User};
    use clap::Parser;
    use store::MemoryStatsStorage;

    fn signed_in_store() -> SessionStore {
        let mut store = SessionStore::open(MemoryStatsStorage::new());
        store.set_auth(
            Some(User {
                id: "u-1".to_string(),
                email: "dr@example.org".to_string(),
                name: "Dr. Ada".to_string(),
            }),
            Some(Session {
                access_token: "token".to_string(),
                refresh_token: None,
                expires_at: None,
            }),
        );
        store
    }

    #[tokio::test]
    async fn test_signs_out_when_dashboard_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "medsai",
            "--patient-id",
            "P-1",
            "--symptoms",
            "cough",
            "--quiet",
        ]);

        let mut config = Config::default();
        config.api.base_url = "http://127.0.0.1:9".to_string();
        config.api.timeout_seconds = 5;
        config.general.output = dir
            .path()
            .join("missing")
            .join("dashboard.md")
            .display()
            .to_string();

        let mut store = signed_in_store();
        store.set_current_case(read_case(&args).unwrap());

        let result =
            analyze_and_sign_out(&args, &config, &mut store, None, vec![AgentName::Symptom]).await;

        assert!(result.is_err());
        assert!(!store.is_authenticated());
        assert!(store.session().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let mut store = SessionStore::open(MemoryStatsStorage::new());
        sign_out(None, &mut store).await;
        assert!(!store.is_authenticated());
    }
}
