use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::entry_store::{EntryStore, Lookup, StoredEntry};
use crate::error::{decode, encode};
use crate::notification::{NotificationBus, Subscription};
use crate::schema::{Schema, StaticKey};
use crate::template;
use crate::HookRegistry;
#[cfg(feature = "stats")]
use crate::CacheStats;

/// Identifies one of the three cache tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TierKind {
    Local,
    Broadcast,
    Persistent,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TierKind::Local => "local",
            TierKind::Broadcast => "broadcast",
            TierKind::Persistent => "persistent",
        })
    }
}

/// Entry store, subscriber sets and delete guard shared by the mutable tiers.
///
/// Works on raw JSON values and string keys; the typed surface lives on
/// [`CacheTier`].
pub struct MemoryTier {
    kind: TierKind,
    store: EntryStore,
    bus: NotificationBus,
    hooks: Arc<HookRegistry>,
    schema: Arc<Schema>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

impl MemoryTier {
    pub fn new(kind: TierKind, schema: Arc<Schema>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            kind,
            store: EntryStore::new(),
            bus: NotificationBus::new(kind),
            hooks,
            schema,
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        }
    }

    pub fn kind(&self) -> TierKind {
        self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Reads the live value for `key`, evicting and notifying if it expired.
    pub fn read(&self, key: &str) -> Option<Value> {
        match self.store.lookup(key) {
            Lookup::Hit(value) => {
                #[cfg(feature = "stats")]
                self.stats.record_hit();
                Some(value)
            }
            Lookup::Evicted => {
                #[cfg(feature = "stats")]
                {
                    self.stats.record_miss();
                    self.stats.record_eviction();
                }
                self.evicted(key);
                None
            }
            Lookup::Missing => {
                #[cfg(feature = "stats")]
                self.stats.record_miss();
                None
            }
        }
    }

    /// Stores `value` and notifies, even when the value is unchanged.
    pub fn write(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.store.insert(key, value, ttl);
        self.bus.notify(key);
    }

    /// Stores `value` without notifying. Used while applying a sync snapshot.
    pub(crate) fn write_quiet(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.store.insert(key, value, ttl);
    }

    /// Deletes `key` unless it is hooked.
    ///
    /// Returns `false` for a hooked key (nothing is touched), `true` otherwise.
    /// Subscribers are notified only if an entry was actually removed.
    pub fn remove(&self, key: &str) -> bool {
        match self.remove_quiet(key) {
            None => false,
            Some(removed) => {
                if removed {
                    self.bus.notify(key);
                }
                true
            }
        }
    }

    /// Guarded delete without notification: `None` if refused, else whether
    /// an entry existed.
    pub(crate) fn remove_quiet(&self, key: &str) -> Option<bool> {
        if self.hooks.is_registered(key) {
            tracing::warn!(tier = %self.kind, key, "refusing to delete a key held by an active hook");
            #[cfg(feature = "stats")]
            self.stats.record_rejected_delete();
            return None;
        }
        Some(self.store.remove(key).is_some())
    }

    /// True if a live entry exists. Evicts an expired one.
    pub fn contains(&self, key: &str) -> bool {
        match self.store.lookup(key) {
            Lookup::Hit(_) => true,
            Lookup::Evicted => {
                #[cfg(feature = "stats")]
                self.stats.record_eviction();
                self.evicted(key);
                false
            }
            Lookup::Missing => false,
        }
    }

    /// True if a live entry exists and carries a TTL. Evicts an expired one.
    pub fn has_ttl(&self, key: &str) -> bool {
        let (state, evicted) = self.store.ttl_state(key);
        if evicted {
            #[cfg(feature = "stats")]
            self.stats.record_eviction();
            self.evicted(key);
        }
        state.unwrap_or(false)
    }

    /// Removes every expired entry, notifying each key once.
    pub fn sweep_expired(&self) -> usize {
        let swept = self.store.sweep_expired();
        for key in &swept {
            #[cfg(feature = "stats")]
            self.stats.record_eviction();
            self.bus.notify(key);
        }
        if !swept.is_empty() {
            tracing::debug!(tier = %self.kind, count = swept.len(), "swept expired entries");
        }
        swept.len()
    }

    pub fn live_entries(&self) -> Vec<StoredEntry> {
        self.store.live_entries()
    }

    /// Resident entries, expired-but-unread ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drops all entries and all subscriptions without notifying.
    pub fn clear(&self) {
        self.store.clear();
        self.bus.clear();
    }

    /// Live value decoded as `T`; `None` when absent, expired or undecodable.
    pub(crate) fn read_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read(key)?;
        match decode(key, value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                tracing::warn!(tier = %self.kind, key, error = %err, "stored value has an unexpected type; using default");
                None
            }
        }
    }

    /// Schema default for a concrete key, decoded as `T`.
    pub(crate) fn default_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let default = self.schema.default_for(key)?.clone();
        match decode(key, default) {
            Ok(typed) => Some(typed),
            Err(err) => {
                tracing::warn!(tier = %self.kind, key, error = %err, "schema default does not match requested type");
                None
            }
        }
    }

    fn evicted(&self, key: &str) {
        tracing::debug!(tier = %self.kind, key, "evicted expired entry");
        self.bus.notify(key);
    }
}

impl fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTier")
            .field("kind", &self.kind)
            .field("entries", &self.store.len())
            .finish()
    }
}

/// Operation surface shared by the local and broadcast tiers.
///
/// Implementors only provide access to their [`MemoryTier`] and may hook
/// into reads (`readable`) and mutations (`after_set`, `after_delete`); every
/// public operation is a provided method so both tiers behave identically.
///
/// Two families of entry points share one entry store:
///
/// - typed, over a [`StaticKey`]: `get`, `set`, `has`, `delete`, `has_ttl`
/// - casual, over a runtime string with a caller-chosen type:
///   `get_casual`, `set_casual`, `has_casual`, `delete_casual`, `has_ttl_casual`
///
/// None of them return errors: failures are logged and reads fall back to
/// the default.
pub trait CacheTier {
    fn memory(&self) -> &MemoryTier;

    /// Whether reads may see stored entries.
    fn readable(&self) -> bool {
        true
    }

    /// Called after a local `set` has been applied.
    fn after_set(&self, _key: &str, _value: &Value, _ttl: Option<Duration>) {}

    /// Called after a local `delete` passed the hook guard.
    fn after_delete(&self, _key: &str) {}

    fn kind(&self) -> TierKind {
        self.memory().kind()
    }

    /// Value of a static key, or its declared default.
    ///
    /// The typed accessors address fixed keys only. A template key is logged
    /// and left untouched: reads give the default, `set` is ignored and the
    /// predicates return `false`. Use [`get_instance`](Self::get_instance)
    /// and [`set_instance`](Self::set_instance) for template families.
    fn get<K: StaticKey>(&self) -> K::Value {
        if !fixed_key::<K>(self.kind()) || !self.readable() {
            return K::default_value();
        }
        self.memory()
            .read_as(K::NAME)
            .unwrap_or_else(K::default_value)
    }

    /// Stores a static key. `ttl` of `None` (or zero) never expires.
    fn set<K: StaticKey>(&self, value: K::Value, ttl: Option<Duration>) {
        if fixed_key::<K>(self.kind()) {
            set_serialized(self, K::NAME, &value, ttl);
        }
    }

    fn has<K: StaticKey>(&self) -> bool {
        fixed_key::<K>(self.kind()) && self.has_casual(K::NAME)
    }

    fn delete<K: StaticKey>(&self) -> bool {
        fixed_key::<K>(self.kind()) && self.delete_casual(K::NAME)
    }

    fn has_ttl<K: StaticKey>(&self) -> bool {
        fixed_key::<K>(self.kind()) && self.has_ttl_casual(K::NAME)
    }

    /// Value of one concrete instance of a template key, or the template's default.
    ///
    /// Invalid `params` (wrong arity, empty or non `[A-Za-z0-9_-]` segments)
    /// are logged and yield the default.
    fn get_instance<K: StaticKey>(&self, params: &[&str]) -> K::Value {
        let Some(key) = instance_key(self.kind(), K::NAME, params) else {
            return K::default_value();
        };
        if !self.readable() {
            return K::default_value();
        }
        self.memory().read_as(&key).unwrap_or_else(K::default_value)
    }

    /// Stores one concrete instance of a template key. Returns `false` for invalid `params`.
    fn set_instance<K: StaticKey>(&self, params: &[&str], value: K::Value, ttl: Option<Duration>) -> bool {
        match instance_key(self.kind(), K::NAME, params) {
            Some(key) => {
                set_serialized(self, &key, &value, ttl);
                true
            }
            None => false,
        }
    }

    /// Value under a runtime key, decoded as `T`.
    ///
    /// Absent keys resolve through the schema: an exact declared key gives
    /// its default, a key matching a template gives that template's default,
    /// anything else gives `None`.
    fn get_casual<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if self.readable() {
            if let Some(value) = self.memory().read_as(key) {
                return Some(value);
            }
        }
        self.memory().default_as(key)
    }

    fn set_casual<T: Serialize>(&self, key: &str, value: T, ttl: Option<Duration>) {
        set_serialized(self, key, &value, ttl);
    }

    fn has_casual(&self, key: &str) -> bool {
        self.readable() && self.memory().contains(key)
    }

    /// Removes `key` unless a hook holds it.
    fn delete_casual(&self, key: &str) -> bool {
        let deleted = self.memory().remove(key);
        if deleted {
            self.after_delete(key);
        }
        deleted
    }

    fn has_ttl_casual(&self, key: &str) -> bool {
        self.readable() && self.memory().has_ttl(key)
    }

    /// Registers a change callback for `key` (set, delete, expiry).
    fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.memory().bus().subscribe(key, callback)
    }

    /// Registers a change callback for a static key.
    fn subscribe_key<K: StaticKey, F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(K::NAME, callback)
    }

    /// Evicts every expired entry now instead of waiting for the next read.
    fn sweep_expired(&self) -> usize {
        self.memory().sweep_expired()
    }

    /// Resident entries, expired-but-unread ones included.
    fn len(&self) -> usize {
        self.memory().len()
    }

    fn is_empty(&self) -> bool {
        self.memory().is_empty()
    }

    #[cfg(feature = "stats")]
    fn stats(&self) -> &CacheStats {
        self.memory().stats()
    }
}

fn set_serialized<C, T>(tier: &C, key: &str, value: &T, ttl: Option<Duration>)
where
    C: CacheTier + ?Sized,
    T: Serialize + ?Sized,
{
    match encode(key, value) {
        Ok(json) => {
            tier.memory().write(key, json.clone(), ttl);
            tier.after_set(key, &json, ttl);
        }
        Err(err) => {
            tracing::warn!(tier = %tier.kind(), key, error = %err, "value cannot be serialized; set ignored");
        }
    }
}

fn fixed_key<K: StaticKey>(kind: TierKind) -> bool {
    if K::is_template() {
        tracing::warn!(
            tier = %kind,
            template = K::NAME,
            "template key used as a concrete key; use get_instance/set_instance"
        );
        return false;
    }
    true
}

fn instance_key(kind: TierKind, template_name: &str, params: &[&str]) -> Option<String> {
    let key = template::instantiate(template_name, params);
    if key.is_none() {
        tracing::warn!(tier = %kind, template = template_name, ?params, "invalid template parameters");
    }
    key
}

/// Per-process tier: entries never leave the process.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use tiercache_core::{CacheTier, HookRegistry, LocalTier, Schema};
///
/// let schema = Arc::new(Schema::builder().entry("ui.theme", "String", json!("system")).build());
/// let local = LocalTier::new(schema, Arc::new(HookRegistry::default()));
///
/// assert_eq!(local.get_casual::<String>("ui.theme").as_deref(), Some("system"));
/// local.set_casual("ui.theme", "dark", None);
/// assert_eq!(local.get_casual::<String>("ui.theme").as_deref(), Some("dark"));
/// assert!(local.delete_casual("ui.theme"));
/// assert_eq!(local.get_casual::<String>("ui.theme").as_deref(), Some("system"));
/// ```
#[derive(Debug)]
pub struct LocalTier {
    memory: MemoryTier,
}

impl LocalTier {
    pub fn new(schema: Arc<Schema>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            memory: MemoryTier::new(TierKind::Local, schema, hooks),
        }
    }

    /// Drops every entry and subscription.
    pub fn clear(&self) {
        self.memory.clear();
    }
}

impl CacheTier for LocalTier {
    fn memory(&self) -> &MemoryTier {
        &self.memory
    }
}
