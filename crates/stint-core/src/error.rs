//! Error taxonomy for timing capture and delivery
//!
//! None of these are fatal. Store and queue operations log them and hand the
//! caller a status value instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimingError {
    /// The remote sink could not be reached or the request could not be built.
    /// Recoverable: the record goes to the backup queue.
    #[error("transport error: {0}")]
    Transport(String),

    /// The local medium rejected a read or write, or a value would not serialize.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored value is not valid JSON or not the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<rusqlite::Error> for TimingError {
    fn from(err: rusqlite::Error) -> Self {
        TimingError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for TimingError {
    fn from(err: reqwest::Error) -> Self {
        TimingError::Transport(err.to_string())
    }
}

pub type TimingResult<T> = std::result::Result<T, TimingError>;
