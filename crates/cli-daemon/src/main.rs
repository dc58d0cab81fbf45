//! CLI entry point for Watcherr
//!
//! Parses command line arguments, installs logging and starts the daemon.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use watcherr::{Config, Daemon, DaemonError, StartupError};

/// Exit code used when no instances are configured
const EXIT_NO_INSTANCES: u8 = 2;

/// Watcherr - removes stalled downloads and unmonitored items from Sonarr/Radarr
#[derive(Parser, Debug)]
#[command(name = "watcherr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to an optional .env file with KEY=VALUE lines
    #[arg(short, long)]
    env_file: Option<PathBuf>,

    /// Log mutating calls instead of sending them
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Run a single tick and exit
    #[arg(long, default_value = "false")]
    once: bool,
}

fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    info!("Watcherr starting...");
    if let Some(path) = &args.config {
        info!("Config file: {}", path.display());
    }

    let mut config = match Config::resolve(args.config.as_deref(), args.env_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if args.dry_run {
        config.general.dry_run = true;
    }

    let mut daemon = match Daemon::new(config) {
        Ok(daemon) => daemon,
        Err(DaemonError::Startup(StartupError::NoInstances)) => {
            error!("No instances defined (set APIS or add [[instances]]). Exiting!");
            return ExitCode::from(EXIT_NO_INSTANCES);
        }
        Err(e) => {
            error!("Failed to initialize daemon: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.once {
        let report = daemon.tick().await;
        info!("Single run finished: {:?}", report);
        return ExitCode::SUCCESS;
    }

    tokio::select! {
        _ = daemon.run() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
                return ExitCode::FAILURE;
            }
            info!("Shutdown signal received, exiting");
        }
    }

    ExitCode::SUCCESS
}
