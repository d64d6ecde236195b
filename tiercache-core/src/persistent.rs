use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{decode, encode, CacheError, Result};
use crate::notification::{NotificationBus, Subscription};
use crate::schema::{Schema, StaticKey};
use crate::storage::DurableStorage;
use crate::tier::TierKind;
#[cfg(feature = "stats")]
use crate::CacheStats;

/// Tier whose values survive restarts through a [`DurableStorage`] backend.
///
/// Only fixed keys declared in the schema are eligible: template names and
/// undeclared keys are rejected. There is no TTL and no delete. Writes go to
/// memory first and then through to storage; a storage failure is logged and
/// the in-memory value is kept.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use tiercache_core::{MemoryStorage, PersistentTier, Schema, StaticKey};
///
/// struct Language;
///
/// impl StaticKey for Language {
///     const NAME: &'static str = "ui.language";
///     type Value = String;
///
///     fn default_value() -> String {
///         "en".to_string()
///     }
/// }
///
/// let schema = Arc::new(Schema::builder().key::<Language>().build());
/// let tier = PersistentTier::new(schema, Arc::new(MemoryStorage::new()));
///
/// assert_eq!(tier.get_persist::<Language>(), "en");
/// assert!(!tier.has_persist::<Language>());
/// assert!(tier.set_persist::<Language>("fr".to_string()));
/// assert_eq!(tier.get_persist::<Language>(), "fr");
/// assert_eq!(tier.get_persist_value("ui.language"), Some(json!("fr")));
/// ```
pub struct PersistentTier {
    schema: Arc<Schema>,
    storage: Arc<dyn DurableStorage>,
    values: RwLock<HashMap<String, Value>>,
    bus: NotificationBus,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl PersistentTier {
    pub fn new(schema: Arc<Schema>, storage: Arc<dyn DurableStorage>) -> Self {
        Self {
            schema,
            storage,
            values: RwLock::new(HashMap::new()),
            bus: NotificationBus::new(TierKind::Persistent),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        }
    }

    /// Stored value of `K`, or its declared default when never set.
    pub fn get_persist<K: StaticKey>(&self) -> K::Value {
        let Some(value) = self.get_persist_value(K::NAME) else {
            return K::default_value();
        };
        match decode(K::NAME, value) {
            Ok(typed) => typed,
            Err(err) => {
                tracing::warn!(tier = %TierKind::Persistent, key = K::NAME, error = %err, "persisted value has an unexpected type; using default");
                K::default_value()
            }
        }
    }

    /// Stored JSON value of a declared key, loading it from storage on first access.
    pub fn get_persist_value(&self, key: &str) -> Option<Value> {
        if self.check_key(key).is_err() {
            return None;
        }

        if let Some(value) = self.values.read().get(key) {
            #[cfg(feature = "stats")]
            self.stats.record_hit();
            return Some(value.clone());
        }

        match self.storage.load(key) {
            Ok(Some(value)) => {
                #[cfg(feature = "stats")]
                self.stats.record_hit();
                // A concurrent set_persist may have landed meanwhile; keep it
                let mut values = self.values.write();
                Some(values.entry(key.to_string()).or_insert(value).clone())
            }
            Ok(None) => {
                #[cfg(feature = "stats")]
                self.stats.record_miss();
                None
            }
            Err(err) => {
                #[cfg(feature = "stats")]
                self.stats.record_miss();
                tracing::warn!(tier = %TierKind::Persistent, key, error = %err, "failed to load persisted value");
                None
            }
        }
    }

    /// Stores `value` in memory and writes it through to storage.
    ///
    /// Returns `false` without touching anything if `K` is not a fixed
    /// schema key or the value cannot be serialized. A storage failure still
    /// returns `true`: the in-memory value is kept and the error is logged.
    pub fn set_persist<K: StaticKey>(&self, value: K::Value) -> bool {
        let key = K::NAME;
        if let Err(err) = self.check_key(key) {
            tracing::warn!(tier = %TierKind::Persistent, key, error = %err, "set_persist rejected");
            return false;
        }

        let json = match encode(key, &value) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(tier = %TierKind::Persistent, key, error = %err, "value cannot be serialized; set_persist ignored");
                return false;
            }
        };

        self.values.write().insert(key.to_string(), json.clone());
        if let Err(err) = self.storage.store(key, &json) {
            tracing::warn!(tier = %TierKind::Persistent, key, error = %err, "failed to write persisted value; in-memory value kept");
        }

        self.bus.notify(key);
        true
    }

    pub fn has_persist<K: StaticKey>(&self) -> bool {
        self.has_persist_key(K::NAME)
    }

    /// True if a value was ever stored for `key` (in this process or on disk).
    pub fn has_persist_key(&self, key: &str) -> bool {
        self.get_persist_value(key).is_some()
    }

    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.bus.subscribe(key, callback)
    }

    pub fn subscribe_key<K: StaticKey, F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(K::NAME, callback)
    }

    /// Values currently held in memory.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Forgets memoized values and subscriptions. Storage is untouched, so
    /// later reads reload from it.
    pub fn clear(&self) {
        self.values.write().clear();
        self.bus.clear();
    }

    fn check_key(&self, key: &str) -> Result<()> {
        match self.schema.get(key) {
            None => Err(CacheError::UnknownKey(key.to_string())),
            Some(entry) if entry.template => Err(CacheError::TemplateKey(key.to_string())),
            Some(_) => Ok(()),
        }
    }
}

impl fmt::Debug for PersistentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentTier")
            .field("loaded", &self.len())
            .finish()
    }
}
