//! Key/value store with optional expiry, used for idempotency and
//! rate-limit markers.
//!
//! Entries whose expiry has passed are treated as absent and removed the
//! next time they are read; no background sweep runs. The whole map lives in
//! one JSON document (`kv.json`) written through the atomic helper, with a
//! write-through in-memory copy guarding concurrent access in-process.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::atomic::{atomic_write_json, read_json_optional};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KvEntry {
    value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// File-backed key/value store with lazy expiry.
pub struct KvStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, KvEntry>>,
}

impl KvStore {
    /// Opens (or creates) the store under the given base path.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let path = base_path.into().join("kv.json");
        let entries = read_json_optional(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Sets a key, optionally expiring after `ttl`.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let entry = KvEntry {
            value: serde_json::to_value(value)?,
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        };
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        entries.insert(key.to_string(), entry);
        atomic_write_json(&self.path, &*entries)
    }

    /// Gets a key's value, evicting it first if its expiry has passed.
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        let expired = entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= Utc::now());
        if expired {
            entries.remove(key);
            atomic_write_json(&self.path, &*entries)?;
            return Ok(None);
        }
        match entries.get(key) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value.clone())?)),
            None => Ok(None),
        }
    }

    /// Whether a key is present (and unexpired).
    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get::<serde_json::Value>(key)?.is_some())
    }

    /// Sets a key only if it is absent; returns `true` when this call won.
    ///
    /// The check-and-set runs under one lock acquisition, so two racing
    /// callers for the same key cannot both win.
    pub fn set_if_absent(&self, key: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut entries = self.entries.lock().expect("kv lock poisoned");
        let live = entries
            .get(key)
            .map(|e| e.expires_at.map_or(true, |at| at > Utc::now()))
            .unwrap_or(false);
        if live {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            KvEntry {
                value: serde_json::Value::Bool(true),
                expires_at: ttl.map(|ttl| Utc::now() + ttl),
            },
        );
        atomic_write_json(&self.path, &*entries)?;
        Ok(true)
    }
}
