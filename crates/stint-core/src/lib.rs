//! Stint core library
//!
//! Survey timing capture with a local, fail-soft backup queue:
//! - Namespaced key-value storage over SQLite
//! - Timing record construction
//! - Fire-and-forget submission to a remote endpoint
//! - Backup queue with replay on startup
//! - Time-based expiry sweep
//! - Local mirror with CSV export

pub mod config;
pub mod constants;
pub mod delivery;
pub mod error;
pub mod expiry;
pub mod mirror;
pub mod paths;
pub mod storage;
pub mod timing;
pub mod tracker;

pub use config::StintConfig;
pub use error::TimingError;
pub use tracker::SurveyTracker;
