use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::entry_store::StoredEntry;
use crate::readiness::{ReadyHandle, Readiness};
use crate::tier::{CacheTier, MemoryTier, TierKind};
use crate::transport::{millis_to_ttl, BroadcastUpdate, Transport};
use crate::{HookRegistry, Schema};

/// Tier shared by every UI surface through an external [`Transport`].
///
/// Local mutations are applied first and then published; a failed publish
/// is logged and does not undo the local change. Remote mutations arrive
/// through [`apply_remote`](Self::apply_remote) and go through the same
/// guarded set/delete path, so local subscribers cannot tell them apart
/// from local writes.
///
/// # Readiness
///
/// The initial contents arrive asynchronously after start-up. Until
/// [`complete_sync`](Self::complete_sync) runs, reads return defaults and
/// `has`/`has_ttl` return `false`; inbound updates are buffered in arrival
/// order and replayed on top of the snapshot when it lands.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use tiercache_core::{BroadcastTier, CacheTier, HookRegistry, NoopTransport, Schema, StoredEntry};
///
/// let schema = Arc::new(Schema::builder().entry("ui.theme", "String", json!("system")).build());
/// let tier = BroadcastTier::new(schema, Arc::new(HookRegistry::default()), Arc::new(NoopTransport));
///
/// assert!(!tier.is_ready());
/// tier.complete_sync(vec![StoredEntry { key: "ui.theme".into(), value: json!("dark"), ttl: None }]);
/// assert!(tier.is_ready());
/// assert_eq!(tier.get_casual::<String>("ui.theme").as_deref(), Some("dark"));
/// ```
pub struct BroadcastTier {
    memory: MemoryTier,
    readiness: Readiness,
    transport: RwLock<Arc<dyn Transport>>,
    inbox: Mutex<Vec<BroadcastUpdate>>,
}

impl BroadcastTier {
    pub fn new(schema: Arc<Schema>, hooks: Arc<HookRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            memory: MemoryTier::new(TierKind::Broadcast, schema, hooks),
            readiness: Readiness::new(),
            transport: RwLock::new(transport),
            inbox: Mutex::new(Vec::new()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// Runs `callback` once the initial sync has completed (immediately if it has).
    pub fn on_ready<F>(&self, callback: F) -> ReadyHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.readiness.on_ready(callback)
    }

    /// Replaces the outbound transport.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.transport.write() = transport;
    }

    /// Applies a mutation received from another process. Never re-published.
    pub fn apply_remote(&self, update: BroadcastUpdate) {
        {
            let mut inbox = self.inbox.lock();
            if !self.readiness.is_ready() {
                tracing::debug!(key = update.key(), "buffering broadcast update until initial sync");
                inbox.push(update);
                return;
            }
        }

        match update {
            BroadcastUpdate::Set { key, value, ttl_ms } => {
                self.memory.write(&key, value, ttl_ms.map(millis_to_ttl));
            }
            BroadcastUpdate::Delete { key } => {
                self.memory.remove(&key);
            }
        }
    }

    /// Installs the initial snapshot and opens the readiness barrier.
    ///
    /// Snapshot entries are applied first, then every update buffered by
    /// [`apply_remote`](Self::apply_remote), in arrival order. The flag then
    /// flips, queued ready callbacks fire in registration order, and every
    /// key touched by the sync is notified once. Returns `false` (and does
    /// nothing) if the tier is already ready.
    pub fn complete_sync(&self, snapshot: Vec<StoredEntry>) -> bool {
        let mut touched: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut touch = |key: &str| {
            if seen.insert(key.to_string()) {
                touched.push(key.to_string());
            }
        };

        let pending = {
            let mut inbox = self.inbox.lock();
            if self.readiness.is_ready() {
                tracing::debug!("broadcast tier already synced; snapshot ignored");
                return false;
            }

            let snapshot_len = snapshot.len();
            for entry in snapshot {
                self.memory.write_quiet(&entry.key, entry.value, entry.ttl);
                touch(&entry.key);
            }

            let buffered = std::mem::take(&mut *inbox);
            let replayed = buffered.len();
            for update in buffered {
                match update {
                    BroadcastUpdate::Set { key, value, ttl_ms } => {
                        self.memory
                            .write_quiet(&key, value, ttl_ms.map(millis_to_ttl));
                        touch(&key);
                    }
                    BroadcastUpdate::Delete { key } => {
                        if self.memory.remove_quiet(&key) == Some(true) {
                            touch(&key);
                        }
                    }
                }
            }

            tracing::debug!(snapshot = snapshot_len, replayed, "broadcast tier synced");
            self.readiness.take_ready()
        };

        let Some(callbacks) = pending else {
            return false;
        };
        self.readiness.fire(callbacks);
        for key in &touched {
            self.memory.bus().notify(key);
        }
        true
    }

    /// Live entries with their remaining TTL, for seeding a new surface.
    pub fn export_snapshot(&self) -> Vec<StoredEntry> {
        self.memory.live_entries()
    }

    /// Updates received before readiness and not yet applied.
    pub fn buffered_updates(&self) -> usize {
        self.inbox.lock().len()
    }

    /// Drops entries, subscriptions, buffered updates and queued ready
    /// callbacks. The readiness flag is kept.
    pub fn clear(&self) {
        self.memory.clear();
        self.inbox.lock().clear();
        self.readiness.clear_pending();
    }

    fn publish(&self, update: BroadcastUpdate) {
        let transport = self.transport.read().clone();
        if let Err(err) = transport.publish(&update) {
            tracing::warn!(key = update.key(), error = %err, "failed to publish broadcast update; local state kept");
        }
    }
}

impl CacheTier for BroadcastTier {
    fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    fn readable(&self) -> bool {
        self.readiness.is_ready()
    }

    fn after_set(&self, key: &str, value: &Value, ttl: Option<Duration>) {
        self.publish(BroadcastUpdate::set(key, value.clone(), ttl));
    }

    fn after_delete(&self, key: &str) {
        self.publish(BroadcastUpdate::delete(key));
    }
}

impl std::fmt::Debug for BroadcastTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastTier")
            .field("ready", &self.is_ready())
            .field("entries", &self.memory.len())
            .field("buffered", &self.buffered_updates())
            .finish()
    }
}
