//! # Cache context
//!
//! One [`CacheContext`] is built at process start and handed to every
//! consumer. It owns the three tiers plus the hook registry they share, and
//! optionally a background [`Sweeper`].

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

use crate::broadcast::BroadcastTier;
use crate::config::CacheConfig;
use crate::hook_registry::HookRegistry;
use crate::persistent::PersistentTier;
use crate::schema::Schema;
use crate::storage::{DurableStorage, MemoryStorage};
use crate::sweeper::Sweeper;
use crate::tier::{CacheTier, LocalTier};
use crate::transport::{NoopTransport, Transport};

/// Local, broadcast and persistent tiers of one process.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tiercache_core::{CacheContext, CacheTier, Schema};
///
/// let ctx = CacheContext::builder()
///     .schema(Schema::builder().entry("ui.theme", "String", json!("system")).build())
///     .build();
///
/// let local = ctx.local();
/// assert_eq!(local.get_casual::<String>("ui.theme").as_deref(), Some("system"));
///
/// local.set_casual("ui.theme", "dark", None);
/// ctx.register_hook("ui.theme");
/// assert!(!local.delete_casual("ui.theme"));
///
/// ctx.unregister_hook("ui.theme");
/// assert!(local.delete_casual("ui.theme"));
/// ```
pub struct CacheContext {
    config: CacheConfig,
    schema: Arc<Schema>,
    hooks: Arc<HookRegistry>,
    local: LocalTier,
    broadcast: Arc<BroadcastTier>,
    persistent: PersistentTier,
    sweeper: Mutex<Option<Sweeper>>,
}

impl CacheContext {
    pub fn builder() -> CacheContextBuilder {
        CacheContextBuilder::default()
    }

    pub fn local(&self) -> &LocalTier {
        &self.local
    }

    pub fn broadcast(&self) -> &BroadcastTier {
        &self.broadcast
    }

    /// Shared handle to the broadcast tier, for attaching it to a transport.
    pub fn broadcast_handle(&self) -> Arc<BroadcastTier> {
        self.broadcast.clone()
    }

    pub fn persistent(&self) -> &PersistentTier {
        &self.persistent
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Guards `key` against `delete` on the local and broadcast tiers.
    pub fn register_hook(&self, key: &str) {
        self.hooks.register(key);
    }

    pub fn unregister_hook(&self, key: &str) {
        self.hooks.unregister(key);
    }

    pub fn is_hook_registered(&self, key: &str) -> bool {
        self.hooks.is_registered(key)
    }

    /// Evicts expired entries from the local and broadcast tiers.
    pub fn sweep_expired(&self) -> usize {
        self.local.sweep_expired() + self.broadcast.sweep_expired()
    }

    /// Resets in-memory state for teardown.
    ///
    /// Clears all three tiers, their subscriptions, the hook registry and
    /// queued ready callbacks. Durable storage and the readiness flag are
    /// left alone.
    pub fn cleanup(&self) {
        self.local.clear();
        self.broadcast.clear();
        self.persistent.clear();
        self.hooks.clear();
        tracing::debug!("cache context cleaned up");
    }

    /// Stops the background sweeper, if one is running.
    pub fn stop_sweeper(&self) {
        // Take first: dropping the sweeper joins its thread
        let sweeper = self.sweeper.lock().take();
        drop(sweeper);
    }

    fn start_sweeper(self: &Arc<Self>) {
        let Some(interval) = self.config.sweep_interval else {
            return;
        };

        let weak: Weak<CacheContext> = Arc::downgrade(self);
        let spawned = Sweeper::spawn(interval, move || match weak.upgrade() {
            Some(ctx) => {
                ctx.sweep_expired();
                true
            }
            None => false,
        });

        match spawned {
            Ok(sweeper) => *self.sweeper.lock() = Some(sweeper),
            Err(err) => {
                tracing::error!(error = %err, "failed to start expiry sweeper; expiry stays lazy");
            }
        }
    }
}

impl std::fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheContext")
            .field("config", &self.config)
            .field("schema_keys", &self.schema.len())
            .field("local", self.local.memory())
            .field("broadcast", &self.broadcast)
            .field("persistent", &self.persistent)
            .finish()
    }
}

/// Builder for [`CacheContext`].
///
/// Defaults: empty schema, [`CacheConfig::default`], [`NoopTransport`] and
/// [`MemoryStorage`].
#[derive(Default)]
pub struct CacheContextBuilder {
    schema: Option<Schema>,
    config: CacheConfig,
    transport: Option<Arc<dyn Transport>>,
    storage: Option<Arc<dyn DurableStorage>>,
}

impl CacheContextBuilder {
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn storage<S: DurableStorage + 'static>(mut self, storage: S) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Shares an existing storage backend, e.g. between two contexts in a test.
    pub fn shared_storage(mut self, storage: Arc<dyn DurableStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Opens the broadcast readiness barrier right away.
    pub fn start_ready(mut self) -> Self {
        self.config.start_ready = true;
        self
    }

    pub fn build(self) -> Arc<CacheContext> {
        let schema = Arc::new(self.schema.unwrap_or_default());
        let hooks = Arc::new(HookRegistry::new(self.config.hook_mode));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(NoopTransport),
        };
        let storage: Arc<dyn DurableStorage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryStorage::new()),
        };

        let broadcast = Arc::new(BroadcastTier::new(schema.clone(), hooks.clone(), transport));
        if self.config.start_ready {
            broadcast.complete_sync(Vec::new());
        }

        let ctx = Arc::new(CacheContext {
            local: LocalTier::new(schema.clone(), hooks.clone()),
            persistent: PersistentTier::new(schema.clone(), storage),
            broadcast,
            hooks,
            schema,
            config: self.config,
            sweeper: Mutex::new(None),
        });
        ctx.start_sweeper();

        tracing::debug!(
            schema_keys = ctx.schema.len(),
            hook_mode = ?ctx.config.hook_mode,
            "cache context built"
        );
        ctx
    }
}
