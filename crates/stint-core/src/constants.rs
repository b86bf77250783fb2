//! Shared constants

/// Storage layout
pub mod storage {
    /// Prefix applied to every key this crate writes
    pub const DEFAULT_NAMESPACE: &str = "survey_timing_";
    /// Sub-namespace for records awaiting redelivery
    pub const BACKUP_PREFIX: &str = "backup_";
    /// Sub-namespace for local mirror copies
    pub const TIMING_PREFIX: &str = "timing_";
    /// Default retention window for stored entries
    pub const DEFAULT_RETENTION_DAYS: u32 = 7;
    /// Database file name inside the config directory
    pub const DATABASE_FILE_NAME: &str = "stint.db";
}

/// Survey rules
pub mod survey {
    /// 30 minutes maximum
    pub const MAX_SURVEY_TIME_SECS: u64 = 1800;
    /// Prefix of generated session ids
    pub const SESSION_ID_PREFIX: &str = "survey_";
    /// Random suffix length of generated session ids
    pub const SESSION_ID_RANDOM_LEN: usize = 8;
}

/// Remote endpoint
pub mod delivery {
    /// Action tag wrapped around every submitted record
    pub const RECORD_TIMING_ACTION: &str = "recordTiming";
    /// Placeholder Apps Script deployment; replace with your own
    pub const DEFAULT_ENDPOINT_URL: &str = "https://script.google.com/macros/s/REPLACE_ME/exec";
}

/// Filesystem layout
pub mod paths {
    pub const CONFIG_DIR_NAME: &str = ".stint";
    pub const CONFIG_FILE_NAME: &str = "config.toml";
    pub const LOGS_DIR_NAME: &str = "logs";
    pub const LOG_FILE_NAME: &str = "stint.log";
}
