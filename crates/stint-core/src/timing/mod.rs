//! Survey timing records
//!
//! Record types, the builder that derives durations and status, session id
//! generation, and duration formatting.

mod builder;
pub mod format;
mod record;

pub use builder::{new_session_id, DeviceInfoProvider, RecordBuilder, SystemDeviceInfo};
pub use format::{format_time, format_time_display};
pub use record::{DeviceInfo, SessionStatus, TimingRecord};
