//! ferrolift - SFTP transfer pipeline
//!
//! Moves files between local folders and SFTP servers according to the units
//! declared in `config.yaml`: downloaders, uploaders, streamers and syncers.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use ferrolift_config::{Config, ConfigBuilder, ConfigLoader, UnitConfig, UnitSection};
use ferrolift_engine::{run_units, PipelineOptions, RunContext, ScanMode, UnitReport};
use ferrolift_transport::{ConnectionManager, LoopbackConnectionManager, SshConnectionManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod display;
mod json_output;
mod logging;

use display::{display_info, display_reports, display_success, display_units, display_warning};
use json_output::RunSummaryJson;

/// Grace period between the stop broadcast and process exit in serve mode
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// ferrolift - SFTP transfer pipeline
#[derive(Parser)]
#[command(
    name = "ferrolift",
    version = env!("CARGO_PKG_VERSION"),
    about = "Moves files between local folders and SFTP servers",
    long_about = "ferrolift scans source folders and moves every file it finds to a destination,\n\
                  local or remote, with bounded parallelism, per-file deadlines and automatic\n\
                  reconnects. Units are declared in config.yaml next to the executable."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Quiet mode - errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Resolve every server to the local filesystem
    #[arg(long, global = true)]
    loopback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass of every enabled downloader
    Download,
    /// Run one pass of every enabled uploader
    Upload,
    /// Run one pass of every enabled streamer
    Stream,
    /// Run one pass of every enabled syncer
    Sync,
    /// Run every enabled unit continuously until interrupted
    Serve,
    /// Validate the configuration and list the enabled units
    Check,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Upload => "upload",
            Self::Stream => "stream",
            Self::Sync => "sync",
            Self::Serve => "serve",
            Self::Check => "check",
        }
    }

    fn section(&self) -> Option<UnitSection> {
        match self {
            Self::Download => Some(UnitSection::Downloaders),
            Self::Upload => Some(UnitSection::Uploaders),
            Self::Stream => Some(UnitSection::Streamers),
            Self::Sync => Some(UnitSection::Syncers),
            Self::Serve | Self::Check => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    let _log_guard = logging::init_logging(&config.logging, cli.debug, cli.quiet)?;

    info!("ferrolift v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Check => check_command(&config)?,
        Commands::Serve => {
            let units = config.all_units()?;
            serve_command(units, &cli).await;
        }
        ref command => {
            let section = command
                .section()
                .context("subcommand does not name a unit section")?;
            let units = config.units(section)?;
            run_once_command(command.name(), units, &cli).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path.clone(),
        None => ConfigLoader::default_config_path()?,
    };
    match ConfigLoader::load_from_file(&path) {
        Ok(config) => Ok(config),
        // These already name the file.
        Err(e) if e.is_file_error() => Err(e.into()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("invalid configuration in {}", path.display()))),
    }
}

fn connection_manager(loopback: bool) -> Arc<dyn ConnectionManager> {
    if loopback {
        warn!("Loopback mode: every server resolves to the local filesystem");
        Arc::new(LoopbackConnectionManager::new())
    } else {
        Arc::new(SshConnectionManager::new())
    }
}

/// Cancel the run on Ctrl-C or SIGTERM
fn install_shutdown_handler(ctx: &Arc<RunContext>) {
    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        ctx.shutdown();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_once_command(command: &str, units: Vec<UnitConfig>, cli: &Cli) -> Result<()> {
    if units.is_empty() {
        info!("No enabled units for {}", command);
        if !cli.quiet && !cli.json {
            display_info(&format!("No enabled units for {}", command));
        }
        return Ok(());
    }

    if !cli.quiet && !cli.json {
        println!(
            "{} Running {} {} unit(s)",
            style("→").green().bold(),
            style(units.len()).cyan(),
            style(command).cyan()
        );
    }

    let started_at = Utc::now();
    let ctx = Arc::new(RunContext::new());
    install_shutdown_handler(&ctx);
    let reports = run_units(
        units,
        Arc::clone(&ctx),
        connection_manager(cli.loopback),
        PipelineOptions::default(),
        ScanMode::OneShot,
    )
    .await;

    report(command, started_at, &reports, cli)
}

async fn serve_command(units: Vec<UnitConfig>, cli: &Cli) {
    if units.is_empty() {
        info!("No enabled units, nothing to serve");
        if !cli.quiet && !cli.json {
            display_info("No enabled units, nothing to serve");
        }
        return;
    }

    info!("Serving {} unit(s), press Ctrl-C to stop", units.len());
    let started_at = Utc::now();
    let ctx = Arc::new(RunContext::new());
    install_shutdown_handler(&ctx);
    let reports = run_units(
        units,
        Arc::clone(&ctx),
        connection_manager(cli.loopback),
        PipelineOptions::default(),
        ScanMode::Continuous,
    )
    .await;

    tokio::time::sleep(SHUTDOWN_GRACE).await;
    if let Err(e) = report("serve", started_at, &reports, cli) {
        warn!("Cannot print summary: {}", e);
    }
    info!("ferrolift stopped");
}

fn report(
    command: &str,
    started_at: chrono::DateTime<Utc>,
    reports: &[UnitReport],
    cli: &Cli,
) -> Result<()> {
    if cli.json {
        let summary = RunSummaryJson::new(command, started_at, reports);
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    display_reports(reports);
    println!();
    let failed: u64 = reports.iter().map(|r| r.stats.files_failed).sum();
    if failed > 0 {
        display_warning(&format!(
            "{} file(s) failed and stay at their source for the next run",
            failed
        ));
    } else {
        display_success(&format!("{} completed", command));
    }
    Ok(())
}

fn check_command(config: &Config) -> Result<()> {
    ConfigBuilder::validate(config)?;
    let units = config.all_units()?;
    display_success(&format!(
        "Configuration is valid: {} server(s), {} enabled unit(s)",
        config.servers.len(),
        units.len()
    ));
    if !units.is_empty() {
        display_units(&units);
    }
    Ok(())
}
