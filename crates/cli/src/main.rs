use std::sync::Arc;

use anyhow::{Context, Result};
use bootstrap::{AuditPolicy, PhaseSequencer, StartupContext, StartupOutcome, StartupReport};
use clap::{Parser, Subcommand};
use server::config::PlatformConfig;
use server::create_router;
use server::services::PlatformCatalog;
use server::state::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Realtime collaboration backend", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, value_name = "ENV")]
    environment: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the platform server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long, value_name = "ENV")]
        environment: Option<String>,
    },
    /// Run the startup sequence without serving and print the report
    Check {
        #[arg(long, value_name = "ENV")]
        environment: Option<String>,

        /// Print the startup report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, environment }) => serve(port, environment.as_deref()).await,
        Some(Commands::Check { environment, json }) => check(environment.as_deref(), json).await,
        None => serve(cli.port, cli.environment.as_deref()).await,
    }
}

fn load_config(port: Option<u16>, environment: Option<&str>) -> Result<PlatformConfig> {
    let mut config = PlatformConfig::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(raw) = environment {
        config.environment = raw.parse()?;
    }
    Ok(config)
}

async fn serve(port: Option<u16>, environment: Option<&str>) -> Result<()> {
    init_tracing();

    let config = load_config(port, environment)?;
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Database: {}", config.database_url);

    let startup = Arc::new(StartupContext::new(config.environment));
    let state = AppState::new(startup.clone(), config.clone());
    let catalog = PlatformCatalog::new(config.clone(), state.event_buffer.clone())?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    // Serve immediately so the liveness and readiness probes answer
    // while the startup sequence is still running.
    let server_task = tokio::spawn(async move { axum::serve(listener, app).await });

    let policy = AuditPolicy::resolve(config.environment, config.bypass_audits);
    let mut sequencer =
        PhaseSequencer::new(startup.clone(), Arc::new(catalog)).with_policy(policy);

    if let Err(error) = sequencer.initialize().await {
        if let Some(report) = startup.report() {
            print_report(&report);
        }
        anyhow::bail!("startup failed: {error}");
    }

    println!();
    println!("Beacon - {}", config.environment);
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://{}", config.bind_addr());
    println!("  Swagger UI:  http://{}/swagger-ui", config.bind_addr());
    println!("  Events:      http://{}/api/events", config.bind_addr());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    server_task.await??;

    Ok(())
}

async fn check(environment: Option<&str>, json: bool) -> Result<()> {
    init_tracing();

    let config = load_config(None, environment)?;
    let startup = Arc::new(StartupContext::new(config.environment));
    let state = AppState::new(startup.clone(), config.clone());
    let catalog = PlatformCatalog::new(config.clone(), state.event_buffer.clone())?;

    let policy = AuditPolicy::resolve(config.environment, config.bypass_audits);
    let mut sequencer =
        PhaseSequencer::new(startup.clone(), Arc::new(catalog)).with_policy(policy);
    let result = sequencer.initialize().await;

    if let Some(report) = startup.report() {
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
    }

    result.map_err(|error| anyhow::anyhow!("startup check failed: {error}"))
}

fn print_report(report: &StartupReport) {
    println!();
    match report.outcome {
        StartupOutcome::Ready => {
            println!("Startup check passed in {} ms", report.total_duration_ms);
        }
        StartupOutcome::Failed => {
            let phase = report
                .failed_phase
                .map(|phase| phase.as_str())
                .unwrap_or("unknown");
            println!("Startup check failed during {phase}");
        }
    }
    println!();

    for timing in &report.timings {
        let marker = if report.completed.contains(&timing.phase) {
            "●"
        } else if report.failed_phase == Some(timing.phase) {
            "✗"
        } else {
            "◐"
        };
        let duration = timing
            .duration_ms
            .map(|ms| format!("{ms} ms"))
            .unwrap_or_else(|| "-".to_string());
        println!("  {} {:<12} {}", marker, timing.phase.as_str(), duration);
    }

    if let Some(error) = &report.error {
        println!();
        println!("Error: {error}");
    }
    println!();
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=info,server=info,bootstrap=info,tower_http=info".into()),
        )
        .init();
}
