//! Timing record construction and session ids

use chrono::{DateTime, Local, Utc};
use rand::Rng;

use super::record::{DeviceInfo, SessionStatus, TimingRecord};
use crate::constants::survey;

/// Supplies environment metadata for a record
pub trait DeviceInfoProvider {
    fn device_info(&self) -> DeviceInfo;
}

/// Reads metadata from the running process
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDeviceInfo;

impl DeviceInfoProvider for SystemDeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        let language = std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(|l| l.replace('_', "-")))
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        DeviceInfo {
            user_agent: format!("stint/{}", env!("CARGO_PKG_VERSION")),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            language,
            timezone: Local::now().format("%:z").to_string(),
            screen_size: None,
            window_size: None,
        }
    }
}

impl DeviceInfoProvider for DeviceInfo {
    fn device_info(&self) -> DeviceInfo {
        self.clone()
    }
}

/// Generate a session id: `survey_<epoch millis>_<8 base-36 chars>`
///
/// The time component keeps ids from different moments apart and the random
/// suffix separates sessions started in the same millisecond.
pub fn new_session_id(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..survey::SESSION_ID_RANDOM_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!(
        "{}{}_{}",
        survey::SESSION_ID_PREFIX,
        now.timestamp_millis(),
        suffix
    )
}

/// Builds immutable [`TimingRecord`]s, clamping durations to the survey limit
#[derive(Debug, Clone, Copy)]
pub struct RecordBuilder {
    max_survey_time_secs: u64,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new(survey::MAX_SURVEY_TIME_SECS)
    }
}

impl RecordBuilder {
    pub fn new(max_survey_time_secs: u64) -> Self {
        Self {
            max_survey_time_secs,
        }
    }

    pub fn max_survey_time_secs(&self) -> u64 {
        self.max_survey_time_secs
    }

    /// Record a finished session
    ///
    /// Status is `timeout` once the elapsed time reaches the limit, otherwise
    /// `completed`.
    pub fn build(
        &self,
        session_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        email: Option<&str>,
        device: &dyn DeviceInfoProvider,
    ) -> TimingRecord {
        self.assemble(session_id, start, end, email, device, None)
    }

    /// Record a session the user left before submitting
    pub fn abandon(
        &self,
        session_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        email: Option<&str>,
        device: &dyn DeviceInfoProvider,
    ) -> TimingRecord {
        self.assemble(
            session_id,
            start,
            end,
            email,
            device,
            Some(SessionStatus::Abandoned),
        )
    }

    fn assemble(
        &self,
        session_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        email: Option<&str>,
        device: &dyn DeviceInfoProvider,
        status: Option<SessionStatus>,
    ) -> TimingRecord {
        let end = if end < start {
            tracing::warn!(
                session_id,
                start = %start,
                end = %end,
                "Session ended before it started, pinning end to start"
            );
            start
        } else {
            end
        };

        let elapsed = u64::try_from((end - start).num_seconds()).unwrap_or(0);
        let time_taken_seconds = elapsed.min(self.max_survey_time_secs);
        let status = status.unwrap_or(if elapsed >= self.max_survey_time_secs {
            SessionStatus::Timeout
        } else {
            SessionStatus::Completed
        });

        TimingRecord {
            session_id: session_id.to_string(),
            timestamp: end,
            email: email
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            start_time: start,
            end_time: end,
            time_taken_seconds,
            time_taken_minutes: time_taken_seconds / 60,
            device_info: device.device_info(),
            status,
        }
    }
}
