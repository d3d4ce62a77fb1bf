//! Schema Refresh CLI
//!
//! Checks, fetches and enhances the cached editor schemas.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use schema_enhancer::{
    default_enhancers, ConfigWatcher, EnhancerContext, FsCacheStore, HttpSchemaFetcher, LayeredSettings,
    Orchestrator, RefreshOutcome, RefreshReason, SettingsSource, TracingTelemetry,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-refresh")]
#[command(about = "Refresh the enhanced site-script and serve schemas")]
struct Cli {
    /// Settings file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the site-script action schema now
    Action,

    /// Refresh the serve configuration schema now
    Serve,

    /// Refresh any schema that is missing or out of date
    Startup,

    /// Refresh on startup and again whenever the settings file changes
    Watch,

    /// Show the freshness of every cached schema
    Status,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> anyhow::Result<()> {
    let source = LayeredSettings::new(cli.config);
    let settings = source.load().context("failed to load settings")?;

    let store = Arc::new(FsCacheStore::new(settings.cache_path()));
    let context = EnhancerContext {
        fetcher: Arc::new(HttpSchemaFetcher::new(settings.fetch_timeout())?),
        store: store.clone(),
        telemetry: Arc::new(TracingTelemetry),
        settings: Arc::new(source.clone()),
    };
    let orchestrator = Arc::new(Orchestrator::new(context, default_enhancers()));

    match cli.command {
        Commands::Action => forced(&orchestrator, "action").await,
        Commands::Serve => forced(&orchestrator, "serve").await,

        Commands::Startup => {
            let outcomes = orchestrator.refresh_all(RefreshReason::Startup).await;
            for (name, outcome) in &outcomes {
                println!("{:<8} {}", name, describe(outcome));
            }
            if outcomes.iter().any(|(_, outcome)| outcome.is_failure()) {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Watch => {
            let path = source
                .watched_path()
                .ok_or_else(|| anyhow!("no settings file to watch; pass --config or run `schema-config init`"))?;
            let watcher = ConfigWatcher::new(&path)?;
            println!("Watching {} (Ctrl-C to stop)", watcher.path().display());

            orchestrator
                .watch(watcher, async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
            Ok(())
        }

        Commands::Status => {
            println!("Cache: {}", store.root().display());
            for (artifact, status) in orchestrator.statuses().await {
                println!("  {:<24} {}", artifact, status);
            }
            Ok(())
        }
    }
}

async fn forced(orchestrator: &Orchestrator, name: &str) -> anyhow::Result<()> {
    let outcome = orchestrator
        .refresh_named(name, true)
        .await
        .ok_or_else(|| anyhow!("unknown enhancer: {}", name))?;

    println!("{}", outcome.status_message());
    if outcome.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

fn describe(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Skipped { status } => format!("skipped ({})", status),
        RefreshOutcome::Refreshed { previous, checksum } => {
            format!("refreshed (was {}, sha256 {})", previous, checksum.short())
        }
        RefreshOutcome::Failed { error, .. } => format!("failed: {}", error),
        RefreshOutcome::Coalesced => "queued".to_string(),
    }
}
