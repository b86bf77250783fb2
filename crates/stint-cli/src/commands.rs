//! Subcommand implementations

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};

use stint_core::mirror::export_file_name;
use stint_core::timing::{format_time, new_session_id, SystemDeviceInfo};
use stint_core::SurveyTracker;

use crate::RecordArgs;

/// When the session ended: `--ended-at`, `--started-at` plus `--seconds`, or now
fn session_end(args: &RecordArgs, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    match (args.ended_at, args.seconds) {
        (Some(end), _) => Ok(end),
        (None, Some(seconds)) => {
            if seconds < 0 {
                bail!("--seconds must not be negative");
            }
            Duration::try_seconds(seconds)
                .and_then(|length| args.started_at.checked_add_signed(length))
                .with_context(|| format!("--seconds {} is out of range", seconds))
        }
        (None, None) => Ok(now),
    }
}

pub async fn record(tracker: &SurveyTracker, args: RecordArgs) -> Result<()> {
    let now = Utc::now();
    let end = session_end(&args, now)?;

    // Replay anything left over from earlier runs first
    sync(tracker).await;

    let session_id = args
        .session_id
        .unwrap_or_else(|| new_session_id(now));
    let builder = tracker.builder();
    let record = if args.abandoned {
        builder.abandon(
            &session_id,
            args.started_at,
            end,
            args.email.as_deref(),
            &SystemDeviceInfo,
        )
    } else {
        builder.build(
            &session_id,
            args.started_at,
            end,
            args.email.as_deref(),
            &SystemDeviceInfo,
        )
    };

    let outcome = tracker.record(&record).await;

    println!("Session:  {}", record.session_id);
    println!(
        "Duration: {} ({})",
        format_time(record.time_taken_seconds),
        record.status
    );
    if outcome.success {
        println!("Sent to {}", tracker.config().endpoint_url);
    } else {
        println!(
            "Could not send ({}); saved for retry",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub async fn flush(tracker: &SurveyTracker) {
    let report = tracker.queue().flush_all().await;
    println!(
        "Retried {}: {} delivered, {} still pending, {} unreadable",
        report.attempted, report.delivered, report.failed, report.skipped
    );
}

pub fn purge(tracker: &SurveyTracker) {
    let removed = tracker.sweep().purge_expired(Utc::now());
    println!(
        "Removed {} entr{} older than {} days or unreadable",
        removed,
        if removed == 1 { "y" } else { "ies" },
        tracker.config().retention_days
    );
}

pub async fn sync(tracker: &SurveyTracker) {
    let report = tracker.startup(Utc::now()).await;
    tracing::info!(
        delivered = report.flush.delivered,
        pending = report.flush.failed,
        purged = report.purged,
        "Startup sync finished"
    );
    if report.flush.attempted > 0 || report.purged > 0 {
        println!(
            "Synced: {} delivered, {} still pending, {} purged",
            report.flush.delivered, report.flush.failed, report.purged
        );
    }
}

pub fn pending(tracker: &SurveyTracker) {
    let queue = tracker.queue();
    let mut ids = queue.pending_session_ids();
    if ids.is_empty() {
        println!("No pending submissions");
        return;
    }

    ids.sort();
    for id in ids {
        match queue.load(&id) {
            Some(record) => println!(
                "{}  {}  {}  {}",
                id,
                record.timestamp.to_rfc3339(),
                format_time(record.time_taken_seconds),
                record.status
            ),
            None => println!("{}  <unreadable>", id),
        }
    }
}

pub fn export(tracker: &SurveyTracker, output: Option<PathBuf>) -> Result<()> {
    let mirror = tracker.mirror();
    if mirror.records().is_empty() {
        println!("No timing data found");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now().date_naive())));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let rows = mirror
        .export_csv(io::BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Exported {} session(s) to {}", rows, path.display());
    Ok(())
}

pub fn clear(tracker: &SurveyTracker, yes: bool) -> Result<()> {
    let namespace = tracker.store().namespace().to_string();
    if !yes && !confirm(&format!("Delete everything stored under '{}'? [y/N] ", namespace))? {
        println!("Aborted");
        return Ok(());
    }

    if tracker.store().clear() {
        println!("Cleared '{}'", namespace);
        Ok(())
    } else {
        bail!("Failed to clear '{}', see the log for details", namespace)
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
