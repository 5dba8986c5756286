//! Versioned engine snapshots.
//!
//! A snapshot is a JSON object `{ "version": N, ...state }` written under one
//! key per engine. Reading is forgiving: a missing key, unparsable JSON or a
//! different version all come back as `None`, which engines treat as a first
//! run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Durable key/value sink for serialized engine state.
pub trait StateStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    #[serde(flatten)]
    state: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    #[serde(flatten)]
    state: T,
}

#[derive(Deserialize)]
struct VersionHeader {
    version: Option<u32>,
}

/// Load the snapshot stored at `key` if it exists and matches `version`.
pub fn load_snapshot<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
    version: u32,
) -> Option<T> {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "snapshot read failed, starting fresh");
            return None;
        }
    };

    match serde_json::from_str::<VersionHeader>(&raw) {
        Ok(VersionHeader { version: Some(v) }) if v == version => {}
        Ok(header) => {
            tracing::warn!(key, found = ?header.version, expected = version, "snapshot version mismatch, discarding");
            return None;
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "snapshot is not valid JSON, discarding");
            return None;
        }
    }

    match serde_json::from_str::<Envelope<T>>(&raw) {
        Ok(envelope) => {
            debug_assert_eq!(envelope.version, version);
            Some(envelope.state)
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "snapshot does not match engine state, discarding");
            None
        }
    }
}

/// Serialize `state` under `key` with the given version.
pub fn save_snapshot<T: Serialize>(
    store: &dyn StateStore,
    key: &str,
    version: u32,
    state: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(&EnvelopeRef { version, state })?;
    store.save(key, &json)
}

/// In-process store, used by tests and by callers that want no durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every `save` fails with [`StoreError::Unavailable`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Overwrite a raw entry, bypassing the snapshot envelope.
    pub fn put_raw(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is read-only".into()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
