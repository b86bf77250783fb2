//! Timing record types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a survey session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completed,
    Timeout,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Timeout => "timeout",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment metadata captured alongside a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub timezone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<String>,
}

impl fmt::Display for DeviceInfo {
    /// Flat `key=value; ...` rendering used by tabular export
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "userAgent={}; platform={}; language={}; timezone={}",
            self.user_agent, self.platform, self.language, self.timezone
        )?;
        if let Some(screen) = &self.screen_size {
            write!(f, "; screenSize={}", screen)?;
        }
        if let Some(window) = &self.window_size {
            write!(f, "; windowSize={}", window)?;
        }
        Ok(())
    }
}

/// One observation of a single survey session
///
/// Built once by [`super::RecordBuilder`] and never mutated afterwards.
/// `session_id` is the identity used for backup keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub email: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_taken_seconds: u64,
    pub time_taken_minutes: u64,
    pub device_info: DeviceInfo,
    pub status: SessionStatus,
}
