//! Persistence layer
//!
//! SQLite-backed storage for:
//! - Namespaced key-value entries (backups and local mirrors)

mod database;
mod kv;

pub use database::Database;
pub use kv::KvStore;

#[cfg(test)]
pub(crate) use kv::tests::create_test_store;
