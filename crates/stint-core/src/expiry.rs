//! Retention policy and sweep
//!
//! An entry is expired once `now - timestamp` exceeds the retention window.
//! The sweep scans every key in the namespace (backups, mirrors, anything
//! else) and removes expired entries along with corrupted ones: anything that
//! no longer parses as JSON, and `backup_`/`timing_` entries that no longer
//! decode as a timing record. Other entries without a readable timestamp are
//! kept.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::constants::storage::{BACKUP_PREFIX, TIMING_PREFIX};
use crate::storage::KvStore;
use crate::timing::TimingRecord;

/// Whether `record` is older than `retention` at `now`
pub fn is_expired(record: &TimingRecord, now: DateTime<Utc>, retention: Duration) -> bool {
    timestamp_expired(record.timestamp, now, retention)
}

fn timestamp_expired(timestamp: DateTime<Utc>, now: DateTime<Utc>, retention: Duration) -> bool {
    now.signed_duration_since(timestamp) > retention
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Expired,
    Corrupted,
}

/// Accepts RFC 3339 strings and epoch milliseconds
fn entry_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value.get("timestamp")? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn holds_record(key: &str) -> bool {
    key.starts_with(BACKUP_PREFIX) || key.starts_with(TIMING_PREFIX)
}

fn classify(key: &str, raw: &str, now: DateTime<Utc>, retention: Duration) -> Verdict {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return Verdict::Corrupted;
    };
    // Record keys must hold decodable records
    if holds_record(key) && serde_json::from_value::<TimingRecord>(value.clone()).is_err() {
        return Verdict::Corrupted;
    }
    match entry_timestamp(&value) {
        Some(timestamp) if timestamp_expired(timestamp, now, retention) => Verdict::Expired,
        _ => Verdict::Keep,
    }
}

pub struct ExpirySweep<'a> {
    store: &'a KvStore,
    retention: Duration,
}

impl<'a> ExpirySweep<'a> {
    pub fn new(store: &'a KvStore, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Remove expired and corrupted entries; returns how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let entries = match self.store.raw_entries("") {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Expiry sweep could not scan storage");
                return 0;
            }
        };

        let mut removed = 0;
        for (key, raw) in entries {
            let verdict = classify(&key, &raw, now, self.retention);
            if verdict == Verdict::Keep {
                continue;
            }
            if self.store.remove(&key) {
                tracing::debug!(key = %key, ?verdict, "Purged stored entry");
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Expiry sweep removed stale entries");
        }
        removed
    }
}
