//! Whole-document JSON persistence behind the `read_state` / `write_state`
//! contract.
//!
//! Writes replace the entire document. There is no cross-writer locking: two
//! processes mutating the same key race and the last write wins.

use crate::error::{PhaseflowError, Result};
use crate::paths;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait StateStore: Send + Sync {
    /// Returns `None` when no document has been written under `key`.
    fn read_state(&self, key: &str) -> Result<Option<Value>>;

    fn write_state(&self, key: &str, value: &Value) -> Result<()>;
}

/// Read and deserialize a document, `None` when absent.
pub fn read_typed<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    match store.read_state(key)? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| PhaseflowError::MalformedState {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

pub fn write_typed<T: Serialize>(store: &dyn StateStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.write_state(key, &value)
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// One pretty-printed JSON file per key under a state directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `<root>/.phaseflow/state`.
    pub fn for_project(root: &Path) -> Self {
        Self::new(paths::state_dir(root))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StateStore for JsonFileStore {
    fn read_state(&self, key: &str) -> Result<Option<Value>> {
        paths::validate_state_key(key)?;
        let path = paths::state_doc_path(&self.dir, key);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let value = serde_json::from_str(&data).map_err(|e| PhaseflowError::MalformedState {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    fn write_state(&self, key: &str, value: &Value) -> Result<()> {
        paths::validate_state_key(key)?;
        let path = paths::state_doc_path(&self.dir, key);
        let mut data = serde_json::to_vec_pretty(value)?;
        data.push(b'\n');
        crate::io::atomic_write(&path, &data)?;
        tracing::debug!(key, path = %path.display(), "state document written");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Process-local store; documents vanish with the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<BTreeMap<String, Value>>,
    writes: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `write_state` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }

    pub fn keys(&self) -> Vec<String> {
        self.docs
            .lock()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn poisoned(key: &str) -> PhaseflowError {
    PhaseflowError::MalformedState {
        key: key.to_string(),
        reason: "memory store lock poisoned".to_string(),
    }
}

impl StateStore for MemoryStore {
    fn read_state(&self, key: &str) -> Result<Option<Value>> {
        let docs = self.docs.lock().map_err(|_| poisoned(key))?;
        Ok(docs.get(key).cloned())
    }

    fn write_state(&self, key: &str, value: &Value) -> Result<()> {
        paths::validate_state_key(key)?;
        self.docs
            .lock()
            .map_err(|_| poisoned(key))?
            .insert(key.to_string(), value.clone());
        *self.writes.lock().map_err(|_| poisoned(key))? += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
