//! Stint - survey timing capture
//!
//! Records how long a survey session took, sends it to the configured
//! endpoint, and keeps anything that could not be delivered for the next run:
//! - `stint record` builds and submits a timing record
//! - `stint sync` replays backups and purges stale entries
//! - `stint export` dumps the local mirror as CSV

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use stint_core::constants::paths as path_names;
use stint_core::{paths, StintConfig, SurveyTracker};

mod commands;

/// Stint - survey timing capture with local backup
#[derive(Parser)]
#[command(name = "stint")]
#[command(about = "Record survey timings and replay the ones that failed to send", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.stint/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr instead of ~/.stint/logs/stint.log
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a finished session and submit it
    ///
    /// Pending backups are replayed first, the same as `stint sync`.
    Record(RecordArgs),

    /// Print a fresh session id
    SessionId,

    /// Retry every pending backup once
    Flush,

    /// Remove entries older than the retention window and corrupted entries
    Purge,

    /// Flush, then purge
    Sync,

    /// List sessions waiting for redelivery
    Pending,

    /// Export the local mirror as CSV
    Export {
        /// Output file (defaults to survey_timing_data_<date>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete everything stored under the configured namespace
    Clear {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct RecordArgs {
    /// When the session started (RFC 3339)
    #[arg(long)]
    pub started_at: DateTime<Utc>,

    /// When the session ended (RFC 3339, defaults to now)
    #[arg(long, conflicts_with = "seconds")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Session length in seconds, instead of --ended-at
    #[arg(long)]
    pub seconds: Option<i64>,

    /// Respondent email
    #[arg(long)]
    pub email: Option<String>,

    /// Reuse an existing session id instead of generating one
    #[arg(long)]
    pub session_id: Option<String>,

    /// Mark the session as abandoned
    #[arg(long)]
    pub abandoned: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into()),
            )
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    // Log to file so command output stays clean
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join(path_names::LOG_FILE_NAME)) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            std::fs::File::create(null_device)
                .with_context(|| format!("Failed to open null device {}", null_device))?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => StintConfig::load_from_path(path)?,
        None => StintConfig::load()?,
    };

    if matches!(cli.command, Commands::SessionId) {
        println!("{}", stint_core::timing::new_session_id(Utc::now()));
        return Ok(());
    }

    let tracker = SurveyTracker::open(config).context("Failed to open timing storage")?;

    match cli.command {
        Commands::Record(args) => commands::record(&tracker, args).await?,
        Commands::SessionId => unreachable!(),
        Commands::Flush => commands::flush(&tracker).await,
        Commands::Purge => commands::purge(&tracker),
        Commands::Sync => commands::sync(&tracker).await,
        Commands::Pending => commands::pending(&tracker),
        Commands::Export { output } => commands::export(&tracker, output)?,
        Commands::Clear { yes } => commands::clear(&tracker, yes)?,
    }

    Ok(())
}
