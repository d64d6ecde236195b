//! # Cross-process transport
//!
//! The broadcast tier mirrors every local mutation through a [`Transport`]
//! and applies inbound ones via
//! [`BroadcastTier::apply_remote`](crate::BroadcastTier::apply_remote). The
//! physical channel (IPC, sockets, ...) belongs to the embedding
//! application; this module only defines the seam plus two in-process
//! implementations.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::BroadcastTier;

/// One mutation of the broadcast tier as it travels between processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BroadcastUpdate {
    /// Publish a value, with the TTL it had left when sent.
    Set {
        key: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl_ms: Option<u64>,
    },
    /// Retract a key.
    Delete { key: String },
}

impl BroadcastUpdate {
    pub fn set(key: &str, value: Value, ttl: Option<Duration>) -> Self {
        BroadcastUpdate::Set {
            key: key.to_string(),
            value,
            ttl_ms: ttl.and_then(ttl_to_millis),
        }
    }

    pub fn delete(key: &str) -> Self {
        BroadcastUpdate::Delete {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            BroadcastUpdate::Set { key, .. } | BroadcastUpdate::Delete { key } => key,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        match self {
            BroadcastUpdate::Set { ttl_ms, .. } => ttl_ms.map(millis_to_ttl),
            BroadcastUpdate::Delete { .. } => None,
        }
    }
}

/// Wire form of a TTL in whole milliseconds.
///
/// Rounds up so a sub-millisecond TTL stays a TTL on the receiving side; a
/// zero TTL means "no TTL" and is not sent at all.
fn ttl_to_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let millis = (ttl.as_nanos() + 999_999) / 1_000_000;
    Some(u64::try_from(millis).unwrap_or(u64::MAX))
}

pub(crate) fn millis_to_ttl(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Outbound side of the cross-process channel.
///
/// `publish` is fire-and-forget: an error is logged by the broadcast tier and
/// never rolls back the local mutation. Implementations must deliver updates
/// for the same key in the order they were published.
pub trait Transport: Send + Sync {
    fn publish(&self, update: &BroadcastUpdate) -> Result<()>;
}

/// Transport for a process with no peers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn publish(&self, _update: &BroadcastUpdate) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct HubPeers {
    peers: Mutex<Vec<(u64, Weak<BroadcastTier>)>>,
    next_id: AtomicU64,
}

/// In-process transport connecting several broadcast tiers.
///
/// Each participant gets a [`MemoryEndpoint`]; an update published by one
/// endpoint is applied synchronously to every other attached tier.
///
/// # Examples
///
/// ```
/// use tiercache_core::{CacheContext, CacheTier, MemoryHub};
///
/// let hub = MemoryHub::new();
///
/// let a_endpoint = hub.endpoint();
/// let a = CacheContext::builder().transport(a_endpoint.clone()).start_ready().build();
/// a_endpoint.attach(a.broadcast_handle());
///
/// let b_endpoint = hub.endpoint();
/// let b = CacheContext::builder().transport(b_endpoint.clone()).start_ready().build();
/// b_endpoint.attach(b.broadcast_handle());
///
/// a.broadcast().set_casual("chat.draft", "hello", None);
/// assert_eq!(b.broadcast().get_casual::<String>("chat.draft").as_deref(), Some("hello"));
/// ```
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubPeers>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new participant. Attach its tier once the tier exists.
    pub fn endpoint(&self) -> MemoryEndpoint {
        MemoryEndpoint {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            hub: self.inner.clone(),
        }
    }

    /// Number of attached tiers still alive.
    pub fn peer_count(&self) -> usize {
        self.inner
            .peers
            .lock()
            .iter()
            .filter(|(_, tier)| tier.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("peers", &self.peer_count())
            .finish()
    }
}

/// One participant of a [`MemoryHub`].
#[derive(Clone)]
pub struct MemoryEndpoint {
    id: u64,
    hub: Arc<HubPeers>,
}

impl MemoryEndpoint {
    /// Registers the tier that receives updates published by other endpoints.
    pub fn attach(&self, tier: Arc<BroadcastTier>) {
        let mut peers = self.hub.peers.lock();
        peers.retain(|(id, peer)| *id != self.id && peer.strong_count() > 0);
        peers.push((self.id, Arc::downgrade(&tier)));
    }

    pub fn detach(&self) {
        self.hub.peers.lock().retain(|(id, _)| *id != self.id);
    }
}

impl Transport for MemoryEndpoint {
    fn publish(&self, update: &BroadcastUpdate) -> Result<()> {
        // Collect first: applying an update may publish again through the hub
        let targets: Vec<Arc<BroadcastTier>> = {
            let peers = self.hub.peers.lock();
            if !peers.iter().any(|(id, _)| *id == self.id) {
                return Err(CacheError::Transport(format!(
                    "endpoint {} is not attached to its hub",
                    self.id
                )));
            }
            peers
                .iter()
                .filter(|(id, _)| *id != self.id)
                .filter_map(|(_, peer)| peer.upgrade())
                .collect()
        };

        for target in targets {
            target.apply_remote(update.clone());
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEndpoint").field("id", &self.id).finish()
    }
}
