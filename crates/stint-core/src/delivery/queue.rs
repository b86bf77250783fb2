//! Backup queue for undelivered timing records
//!
//! Failed submissions are parked under `backup_<sessionId>` and replayed by
//! [`BackupQueue::flush_all`], normally once per process start. Delivery is
//! at-least-once with unbounded retries: no backoff, no attempt cap. Entries
//! that never get through stay queued until the expiry sweep removes them.

use serde::Serialize;

use super::client::{SendOutcome, TimingSink};
use crate::constants::storage::BACKUP_PREFIX;
use crate::storage::KvStore;
use crate::timing::TimingRecord;

/// Counts from one replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Backups loaded and handed to the sink
    pub attempted: usize,
    /// Sent and removed from the queue
    pub delivered: usize,
    /// Send failed; left in place for the next pass
    pub failed: usize,
    /// Could not be decoded; left for the expiry sweep
    pub skipped: usize,
}

pub struct BackupQueue<'a> {
    store: &'a KvStore,
    sink: &'a dyn TimingSink,
}

impl<'a> BackupQueue<'a> {
    pub fn new(store: &'a KvStore, sink: &'a dyn TimingSink) -> Self {
        Self { store, sink }
    }

    /// Logical storage key for a session's backup
    pub fn backup_key(session_id: &str) -> String {
        format!("{}{}", BACKUP_PREFIX, session_id)
    }

    /// Park a record for later redelivery
    ///
    /// Keyed by session id, so persisting the same session again replaces the
    /// earlier copy.
    pub fn persist(&self, record: &TimingRecord) -> bool {
        let saved = self
            .store
            .set(&Self::backup_key(&record.session_id), record);
        if saved {
            tracing::info!(session_id = %record.session_id, "Timing record backed up locally");
        }
        saved
    }

    /// Load a parked record
    pub fn load(&self, session_id: &str) -> Option<TimingRecord> {
        self.store.get(&Self::backup_key(session_id))
    }

    /// Session ids currently waiting for redelivery
    pub fn pending_session_ids(&self) -> Vec<String> {
        self.store
            .list_keys(BACKUP_PREFIX)
            .into_iter()
            .filter_map(|key| key.strip_prefix(BACKUP_PREFIX).map(str::to_string))
            .collect()
    }

    /// Send once; park the record if the send fails
    pub async fn submit(&self, record: &TimingRecord) -> SendOutcome {
        let outcome = self.sink.send(record).await;
        if !outcome.success && !self.persist(record) {
            tracing::error!(
                session_id = %record.session_id,
                "Timing record could not be sent or backed up"
            );
        }
        outcome
    }

    /// Replay every parked record through the sink
    ///
    /// Strictly sequential. Each entry is handled on its own: a bad entry or a
    /// failed send never stops the pass. An entry is removed only after its
    /// send succeeded.
    pub async fn flush_all(&self) -> FlushReport {
        let mut report = FlushReport::default();

        for key in self.store.list_keys(BACKUP_PREFIX) {
            let Some(record) = self.store.get::<TimingRecord>(&key) else {
                tracing::debug!(key = %key, "Skipping unreadable backup entry");
                report.skipped += 1;
                continue;
            };

            report.attempted += 1;
            let outcome = self.sink.send(&record).await;
            if !outcome.success {
                tracing::warn!(
                    key = %key,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Retry failed, keeping backup"
                );
                report.failed += 1;
                continue;
            }

            if !self.store.remove(&key) {
                // Sent but still queued; the next pass will send it again
                tracing::warn!(key = %key, "Retry succeeded but backup could not be removed");
            }
            tracing::info!(key = %key, "Retry successful");
            report.delivered += 1;
        }

        if report.attempted > 0 || report.skipped > 0 {
            tracing::info!(
                attempted = report.attempted,
                delivered = report.delivered,
                failed = report.failed,
                skipped = report.skipped,
                "Backup flush finished"
            );
        }
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::expiry::ExpirySweep;
    use crate::storage::create_test_store;
    use crate::timing::{DeviceInfo, RecordBuilder};

    /// Sink whose connectivity can be toggled; remembers what it delivered
    pub(crate) struct FakeSink {
        online: AtomicBool,
        delivered: Mutex<Vec<String>>,
        reject: Mutex<Vec<String>>,
    }

    impl FakeSink {
        pub(crate) fn new(online: bool) -> Self {
            Self {
                online: AtomicBool::new(online),
                delivered: Mutex::new(Vec::new()),
                reject: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        fn reject_session(&self, session_id: &str) {
            self.reject.lock().unwrap().push(session_id.to_string());
        }

        pub(crate) fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TimingSink for FakeSink {
        async fn send(&self, record: &TimingRecord) -> SendOutcome {
            if !self.online.load(Ordering::SeqCst) {
                return SendOutcome::failed("network unreachable");
            }
            if self.reject.lock().unwrap().contains(&record.session_id) {
                return SendOutcome::failed("connection reset");
            }
            self.delivered
                .lock()
                .unwrap()
                .push(record.session_id.clone());
            SendOutcome::sent()
        }
    }

    pub(crate) fn record(session_id: &str, seconds: i64) -> TimingRecord {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        RecordBuilder::default().build(
            session_id,
            start,
            start + Duration::seconds(seconds),
            None,
            &DeviceInfo::default(),
        )
    }

    #[test]
    fn test_persist_then_load_round_trips() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        let queue = BackupQueue::new(&store, &sink);
        let original = record("s1", 125);

        assert!(queue.persist(&original));
        assert_eq!(queue.load("s1"), Some(original.clone()));
        assert_eq!(store.get::<TimingRecord>("backup_s1"), Some(original));
    }

    #[test]
    fn test_persist_is_idempotent_per_session() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        let queue = BackupQueue::new(&store, &sink);

        assert!(queue.persist(&record("s1", 60)));
        assert!(queue.persist(&record("s1", 90)));

        assert_eq!(store.list_keys("backup_"), vec!["backup_s1"]);
        assert_eq!(queue.load("s1").unwrap().time_taken_seconds, 90);
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_is_noop() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        let queue = BackupQueue::new(&store, &sink);

        assert_eq!(queue.flush_all().await, FlushReport::default());
        assert!(sink.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_flush_removes_delivered_backups() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        let queue = BackupQueue::new(&store, &sink);
        queue.persist(&record("s1", 10));
        queue.persist(&record("s2", 20));

        let report = queue.flush_all().await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
        assert!(queue.pending_session_ids().is_empty());
        let mut delivered = sink.delivered();
        delivered.sort();
        assert_eq!(delivered, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_backup_for_next_pass() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(false);
        let queue = BackupQueue::new(&store, &sink);
        queue.persist(&record("s1", 10));

        let first = queue.flush_all().await;
        assert_eq!(first.failed, 1);
        assert_eq!(queue.pending_session_ids(), vec!["s1"]);

        sink.set_online(true);
        let second = queue.flush_all().await;
        assert_eq!(second.delivered, 1);
        assert!(queue.pending_session_ids().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_pass() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        sink.reject_session("bad");
        let queue = BackupQueue::new(&store, &sink);
        queue.persist(&record("bad", 10));
        queue.persist(&record("good1", 10));
        queue.persist(&record("good2", 10));
        store.set_raw("backup_corrupt", "{{{");

        let report = queue.flush_all().await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        let mut pending = queue.pending_session_ids();
        pending.sort();
        assert_eq!(pending, vec!["bad", "corrupt"]);
    }

    #[tokio::test]
    async fn test_skipped_backup_is_removed_by_the_sweep() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        let queue = BackupQueue::new(&store, &sink);
        store.set_raw("backup_x", r#"{"sessionId":"x"}"#);

        let report = queue.flush_all().await;
        assert_eq!(report.skipped, 1);
        assert_eq!(queue.pending_session_ids(), vec!["x"]);

        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let purged = ExpirySweep::new(&store, Duration::days(7)).purge_expired(now);
        assert_eq!(purged, 1);
        assert!(queue.pending_session_ids().is_empty());
    }

    #[tokio::test]
    async fn test_submit_backs_up_only_on_failure() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(true);
        let queue = BackupQueue::new(&store, &sink);

        let outcome = queue.submit(&record("online", 10)).await;
        assert!(outcome.success);
        assert!(queue.pending_session_ids().is_empty());

        sink.set_online(false);
        let outcome = queue.submit(&record("offline", 10)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("network unreachable"));
        assert_eq!(queue.pending_session_ids(), vec!["offline"]);
    }

    #[tokio::test]
    async fn test_offline_then_online_scenario() {
        let (store, _temp) = create_test_store();
        let sink = FakeSink::new(false);
        let queue = BackupQueue::new(&store, &sink);

        let record = record("s1", 125);
        assert_eq!(record.time_taken_seconds, 125);
        assert_eq!(record.time_taken_minutes, 2);

        let outcome = sink.send(&record).await;
        assert!(!outcome.success);
        assert!(queue.persist(&record));
        assert!(store.list_keys("backup_").contains(&"backup_s1".to_string()));
        assert!(queue.pending_session_ids().contains(&"s1".to_string()));

        sink.set_online(true);
        queue.flush_all().await;
        assert!(!store.list_keys("backup_").contains(&"backup_s1".to_string()));
        assert!(!queue.pending_session_ids().contains(&"s1".to_string()));
    }
}
