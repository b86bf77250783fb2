//! Delivery of timing records to the remote sink

pub mod client;
pub mod queue;

pub use client::{HttpSubmissionClient, SendOutcome, TimingSink};
pub use queue::{BackupQueue, FlushReport};
