//! Namespaced, fail-soft key-value store
//!
//! Callers pass logical keys; every key is prefixed with the namespace before
//! it reaches SQLite, so several namespaces can share one database. Public
//! operations never return errors: failures are logged and surface as
//! `false` / `None`.

use chrono::Utc;
use rusqlite::params;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::database::Database;
use crate::error::{TimingError, TimingResult};

// substr/length instead of LIKE: logical prefixes contain `_`
const PREFIX_FILTER: &str = "substr(key, 1, length(?1)) = ?1";

pub struct KvStore {
    db: Database,
    namespace: String,
}

impl KvStore {
    pub fn new(db: Database, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get reference to underlying database
    pub fn db(&self) -> &Database {
        &self.db
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Serialize `value` as JSON and store it under `key`, replacing any previous value
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_set(key, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "Storage set failed");
                false
            }
        }
    }

    /// Read and decode the value under `key`
    ///
    /// Missing, unreadable and undecodable entries all come back as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.try_get_raw(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::error!(key, error = %e, "Storage get failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Skipping undecodable entry");
                None
            }
        }
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub fn remove(&self, key: &str) -> bool {
        match self.try_remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key, error = %e, "Storage remove failed");
                false
            }
        }
    }

    /// Delete every entry in this namespace, leaving other namespaces alone
    pub fn clear(&self) -> bool {
        match self
            .db
            .conn()
            .execute(&format!("DELETE FROM kv_entries WHERE {PREFIX_FILTER}"), [&self.namespace])
        {
            Ok(removed) => {
                tracing::info!(namespace = %self.namespace, removed, "Cleared storage namespace");
                true
            }
            Err(e) => {
                tracing::error!(namespace = %self.namespace, error = %e, "Storage clear failed");
                false
            }
        }
    }

    /// Logical keys in this namespace that start with `prefix`, in no particular order
    pub fn list_keys(&self, prefix: &str) -> Vec<String> {
        match self.try_list_keys(prefix) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(prefix, error = %e, "Storage key listing failed");
                Vec::new()
            }
        }
    }

    /// Logical key and raw stored text for every entry under `prefix`
    pub(crate) fn raw_entries(&self, prefix: &str) -> TimingResult<Vec<(String, String)>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT key, value FROM kv_entries WHERE {PREFIX_FILTER}"
        ))?;
        let rows = stmt.query_map([self.full_key(prefix)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (key, value) = row?;
            if let Some(logical) = key.strip_prefix(&self.namespace) {
                entries.push((logical.to_string(), value));
            }
        }
        Ok(entries)
    }

    fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> TimingResult<()> {
        let json = serde_json::to_string(value).map_err(|e| TimingError::Storage(e.to_string()))?;
        self.put_raw(key, &json)
    }

    fn put_raw(&self, key: &str, json: &str) -> TimingResult<()> {
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![self.full_key(key), json, now],
        )?;
        Ok(())
    }

    fn try_get_raw(&self, key: &str) -> TimingResult<Option<String>> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT value FROM kv_entries WHERE key = ?1")?;
        let mut rows = stmt.query([self.full_key(key)])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn try_remove(&self, key: &str) -> TimingResult<()> {
        self.db
            .conn()
            .execute("DELETE FROM kv_entries WHERE key = ?1", [self.full_key(key)])?;
        Ok(())
    }

    fn try_list_keys(&self, prefix: &str) -> TimingResult<Vec<String>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT key FROM kv_entries WHERE {PREFIX_FILTER}"
        ))?;
        let keys = stmt
            .query_map([self.full_key(prefix)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&self.namespace).map(str::to_string))
            .collect())
    }

    /// Store text as-is, bypassing serialization
    #[cfg(test)]
    pub(crate) fn set_raw(&self, key: &str, raw: &str) {
        self.put_raw(key, raw).expect("Failed to write raw entry");
    }
}
