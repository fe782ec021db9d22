mod commands;
mod prompt;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use camsweep_core::config::Config;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "camsweep.log";

/// camsweep: home camera capture, dedup and cloud mirror
#[derive(Parser)]
#[command(name = "camsweep", version, about)]
struct Cli {
    /// Environment file to load configuration from
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture, dedup and sync on a fixed schedule until interrupted
    Run,
    /// Interactively write the environment file
    Setup,
    /// Capture one image from every camera
    Capture,
    /// Remove near-duplicates from the most recent day of every camera
    Dedup {
        /// Image root (defaults to OUTPUT_FOLDER)
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Mirror the image tree to cloud storage
    Sync,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing()?;

    // Loaded for setup too, so existing values become the wizard's defaults.
    load_env_file(&cli.env_file)?;

    match cli.command {
        Commands::Setup => commands::setup::run(&cli.env_file)?,
        Commands::Dedup { root: Some(root) } => commands::dedup::run(&root)?,
        Commands::Dedup { root: None } => commands::dedup::run(&load_config()?.output_root)?,
        Commands::Run => commands::run::run(load_config()?)?,
        Commands::Capture => commands::capture::run(load_config()?)?,
        Commands::Sync => commands::sync::run(load_config()?)?,
    }

    Ok(())
}

fn load_env_file(path: &Path) -> Result<()> {
    if path.exists() {
        dotenv::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }
    Ok(())
}

fn load_config() -> Result<Config> {
    Config::from_env().context("configuration is incomplete; run `camsweep setup`")
}

/// Console plus plain-text file output. `RUST_LOG` overrides the default
/// `info` level.
fn init_tracing() -> Result<WorkerGuard> {
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(".", LOG_FILE));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("failed to initialize logging")?;

    Ok(guard)
}
