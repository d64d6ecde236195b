//! # Durable storage
//!
//! Backends for the persistent tier. The tier only needs a synchronous
//! key/value read and write; anything fancier belongs to the embedding
//! application.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CacheError, Result};

/// Synchronous key/value backend behind the persistent tier.
pub trait DurableStorage: Send + Sync {
    /// Reads a key; `Ok(None)` when it was never stored.
    fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a key through to durable storage.
    fn store(&self, key: &str, value: &Value) -> Result<()>;
}

/// Volatile backend, for tests and processes without a data directory.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tiercache_core::{DurableStorage, MemoryStorage};
///
/// let storage = MemoryStorage::new();
/// storage.store("ui.language", &json!("en")).unwrap();
/// assert_eq!(storage.load("ui.language").unwrap(), Some(json!("en")));
/// assert_eq!(storage.load("missing").unwrap(), None);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: DashMap<String, Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl DurableStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).map(|value| value.clone()))
    }

    fn store(&self, key: &str, value: &Value) -> Result<()> {
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// Backend keeping every key in one JSON object on disk.
///
/// The whole file is loaded on [`open`](Self::open). Each
/// [`store`](DurableStorage::store) rewrites it through a sibling temporary
/// file renamed into place, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStorage {
    /// Opens (or prepares to create) the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|err| {
                    CacheError::Storage(format!("{} is not a JSON object: {err}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "opened persistent cache file");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let encoded = serde_json::to_vec_pretty(values)
            .map_err(|err| CacheError::Storage(format!("cannot encode cache file: {err}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DurableStorage for JsonFileStorage {
    fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &Value) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.clone());
        self.flush(&values)
    }
}
