//! certrenew - Main entry point
//!
//! Keeps the TLS certificates of function-compute custom domains renewed.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use certrenew::renewal::reason_label;
use certrenew::{build_orchestrator, trigger, CertificateAuthority, RenewalScheduler};
use certrenew_common::{CertificateId, RenewalDecision};
use certrenew_config::{env_vars, validate_config, Config, Credentials};

/// certrenew - TLS certificate renewal for function-compute custom domains
#[derive(Parser, Debug)]
#[command(name = "certrenew")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "CERTRENEW_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs", global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check every domain once and renew where needed (default)
    Run,
    /// Keep running and check domains periodically
    Daemon,
    /// Report which domains need renewal without changing anything
    Check,
    /// Print the authority's detail for one certificate
    CertDetail {
        /// Certificate id on the authority
        id: i64,
    },
    /// Validate configuration file and exit
    Test,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Test => test_config(&config, cli.config.as_deref()),
        Commands::Run => block_on(run_once(config)),
        Commands::Daemon => block_on(run_daemon(config)),
        Commands::Check => block_on(check_domains(config)),
        Commands::CertDetail { id } => block_on(cert_detail(config, CertificateId::new(id))),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => info!("Loading configuration from: {}", path.display()),
        None => info!("No configuration specified, using embedded default configuration"),
    }
    Config::load(path).context("Failed to load configuration")
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(future)
}

/// Validate configuration and exit
fn test_config(config: &Config, path: Option<&std::path::Path>) -> Result<()> {
    let result = validate_config(config);

    for warning in &result.warnings {
        warn!("{}", warning);
    }

    if !result.is_ok() {
        for error in &result.errors {
            tracing::error!("{}", error);
        }
        anyhow::bail!("Configuration validation failed with {} error(s)", result.errors.len());
    }

    info!("Configuration test successful:");
    info!("  - {} domain(s)", config.renewal.domains.len());
    info!("  - validation type {}", config.renewal.validation_type);
    info!("  - renew {} day(s) before expiry", config.renewal.renew_before_days);

    println!(
        "certrenew: configuration {} test is successful",
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(embedded)".to_string())
    );
    Ok(())
}

async fn run_once(config: Config) -> Result<()> {
    config.validate().context("Configuration validation failed")?;
    trigger::invoke(&config, env_vars())
        .await
        .context("Certificate renewal run failed")?;
    Ok(())
}

async fn run_daemon(config: Config) -> Result<()> {
    config.validate().context("Configuration validation failed")?;
    let credentials = Credentials::from_env()?;
    let orchestrator = build_orchestrator(&config, credentials)?;

    RenewalScheduler::new(orchestrator, config.renewal.domains.clone())
        .with_interval(config.renewal.check_interval())
        .run(shutdown_signal())
        .await;
    Ok(())
}

async fn check_domains(config: Config) -> Result<()> {
    config.validate().context("Configuration validation failed")?;
    let credentials = Credentials::from_env()?;
    let orchestrator = build_orchestrator(&config, credentials)?;
    let now = Utc::now();

    let mut failures = 0;
    for domain in &config.renewal.domains {
        match orchestrator.inspect(domain, now).await {
            Ok(RenewalDecision::Keep { days_remaining }) => {
                println!("{}: valid, {:.2} day(s) remaining", domain, days_remaining);
            }
            Ok(RenewalDecision::Renew(reason)) => {
                println!("{}: needs renewal ({})", domain, reason_label(&reason));
            }
            Err(e) => {
                failures += 1;
                println!("{}: check failed: {}", domain, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} domain(s) could not be checked", failures);
    }
    Ok(())
}

async fn cert_detail(config: Config, id: CertificateId) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let orchestrator = build_orchestrator(&config, credentials)?;

    let detail = orchestrator
        .authority()
        .certificate_detail(id)
        .await
        .with_context(|| format!("Failed to fetch certificate {}", id))?;

    println!("{}", serde_json::to_string_pretty(&detail)?);
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
