use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::CacheEntry;

/// Outcome of a lookup in an [`EntryStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    /// A live entry was found.
    Hit(Value),
    /// An expired entry was found and removed by this lookup.
    Evicted,
    /// No entry exists for the key.
    Missing,
}

/// A live entry exported from a store, with the lifetime it has left.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEntry {
    pub key: String,
    pub value: Value,
    pub ttl: Option<Duration>,
}

/// Key to [`CacheEntry`] mapping with lazy expiry on read.
///
/// Used identically by the local and broadcast tiers. Expired entries stay
/// resident until the key is read, overwritten, swept or the store is
/// cleared; nothing runs in the background.
///
/// # Thread Safety
///
/// The map is guarded by a `parking_lot::RwLock`. Lookups take the read lock
/// first and only upgrade to a write lock when an expired entry has to be
/// removed, re-checking the deadline under the write lock so that a
/// concurrent overwrite is never evicted by mistake.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tiercache_core::{EntryStore, Lookup};
///
/// let store = EntryStore::new();
/// store.insert("ui.theme", json!("dark"), None);
/// assert_eq!(store.lookup("ui.theme"), Lookup::Hit(json!("dark")));
/// assert_eq!(store.lookup("missing"), Lookup::Missing);
/// ```
#[derive(Debug, Default)]
pub struct EntryStore {
    map: RwLock<HashMap<String, CacheEntry<Value>>>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key, evicting it if its deadline has passed.
    ///
    /// Returns [`Lookup::Evicted`] exactly once per expired entry: the caller
    /// is expected to notify subscribers when it sees it.
    pub fn lookup(&self, key: &str) -> Lookup {
        let now = Instant::now();

        {
            let map = self.map.read();
            match map.get(key) {
                Some(entry) if entry.is_expired_at(now) => {}
                Some(entry) => return Lookup::Hit(entry.value.clone()),
                None => return Lookup::Missing,
            }
        } // Read lock released here

        if self.remove_if_expired(key, now) {
            Lookup::Evicted
        } else {
            // Overwritten or removed between the two lock phases
            match self.map.read().get(key) {
                Some(entry) if !entry.is_expired_at(now) => Lookup::Hit(entry.value.clone()),
                _ => Lookup::Missing,
            }
        }
    }

    /// Returns `Some(has_ttl)` for a live entry, `None` when absent.
    ///
    /// Like [`lookup`](Self::lookup) this evicts an expired entry; the second
    /// element reports whether that happened.
    pub fn ttl_state(&self, key: &str) -> (Option<bool>, bool) {
        let now = Instant::now();
        {
            let map = self.map.read();
            match map.get(key) {
                Some(entry) if !entry.is_expired_at(now) => {
                    return (Some(entry.has_ttl()), false)
                }
                Some(_) => {}
                None => return (None, false),
            }
        }
        (None, self.remove_if_expired(key, now))
    }

    /// Inserts or replaces the entry for `key`.
    pub fn insert(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.map
            .write()
            .insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    /// Removes the entry for `key`, returning it if one existed.
    ///
    /// Expired-but-resident entries are returned as well.
    pub fn remove(&self, key: &str) -> Option<CacheEntry<Value>> {
        self.map.write().remove(key)
    }

    /// Removes every expired entry and returns the removed keys.
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = Instant::now();
        let mut map = self.map.write();
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            map.remove(key);
        }
        expired
    }

    /// Exports all live entries with their remaining TTL.
    pub fn live_entries(&self) -> Vec<StoredEntry> {
        let now = Instant::now();
        self.map
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| StoredEntry {
                key: key.clone(),
                value: entry.value.clone(),
                ttl: entry.remaining_ttl_at(now),
            })
            .collect()
    }

    /// Number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Drops every entry without reporting them.
    pub fn clear(&self) {
        self.map.write().clear();
    }

    fn remove_if_expired(&self, key: &str, now: Instant) -> bool {
        let mut map = self.map.write();
        match map.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }
}
