//! Survey tracker
//!
//! Owns the store and the sink for one process and hands out the queue,
//! mirror and sweep views over them. `startup` is what runs when the process
//! comes up: replay the backlog, then purge stale entries.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::StintConfig;
use crate::delivery::{BackupQueue, FlushReport, HttpSubmissionClient, SendOutcome, TimingSink};
use crate::expiry::ExpirySweep;
use crate::mirror::LocalMirror;
use crate::storage::{Database, KvStore};
use crate::timing::{RecordBuilder, TimingRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    pub flush: FlushReport,
    pub purged: usize,
}

pub struct SurveyTracker {
    config: StintConfig,
    store: KvStore,
    sink: Box<dyn TimingSink>,
}

impl SurveyTracker {
    /// Open the configured database and post to the configured endpoint
    pub fn open(config: StintConfig) -> Result<Self> {
        let db = Database::new(&config.database_path())?;
        let store = KvStore::new(db, config.namespace.clone());
        let sink = Box::new(HttpSubmissionClient::from_config(&config));
        tracing::debug!(
            endpoint = %config.endpoint_url,
            namespace = %config.namespace,
            "Survey tracker opened"
        );
        Ok(Self::with_parts(config, store, sink))
    }

    pub fn with_parts(config: StintConfig, store: KvStore, sink: Box<dyn TimingSink>) -> Self {
        Self {
            config,
            store,
            sink,
        }
    }

    pub fn config(&self) -> &StintConfig {
        &self.config
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn builder(&self) -> RecordBuilder {
        RecordBuilder::new(self.config.max_survey_time_secs)
    }

    pub fn queue(&self) -> BackupQueue<'_> {
        BackupQueue::new(&self.store, self.sink.as_ref())
    }

    pub fn mirror(&self) -> LocalMirror<'_> {
        LocalMirror::new(&self.store)
    }

    pub fn sweep(&self) -> ExpirySweep<'_> {
        ExpirySweep::new(&self.store, self.config.retention())
    }

    /// Mirror the record locally, then submit it (backing it up on failure)
    pub async fn record(&self, record: &TimingRecord) -> SendOutcome {
        if !self.mirror().record(record) {
            tracing::warn!(session_id = %record.session_id, "Local mirror write failed");
        }
        self.queue().submit(record).await
    }

    /// Replay pending backups, then purge entries past the retention window
    pub async fn startup(&self, now: DateTime<Utc>) -> StartupReport {
        let flush = self.queue().flush_all().await;
        let purged = self.sweep().purge_expired(now);
        StartupReport { flush, purged }
    }
}
