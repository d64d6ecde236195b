//! # Tiercache Core
//!
//! Core types for the tiercache key/value cache.
//!
//! A process owns one [`CacheContext`] holding three independent tiers that
//! share a static schema of keys and defaults:
//!
//! - **Local**: per-process entries with optional TTL
//! - **Broadcast**: entries mirrored to every UI surface through a [`Transport`],
//!   hidden behind a readiness barrier until the initial sync lands
//! - **Persistent**: schema keys written through to a [`DurableStorage`] backend
//!
//! ## Features
//!
//! - **Typed and casual keys**: [`StaticKey`] types for the declared schema,
//!   plain strings with a caller-chosen type for everything else
//! - **Template keys**: schema names such as `ocr/provider/${id}` give a
//!   default to a whole family of concrete keys
//! - **Lazy TTL**: expired entries are evicted (and announced) on the next read,
//!   with an optional background [`Sweeper`]
//! - **Delete guard**: keys claimed in the [`HookRegistry`] cannot be deleted
//! - **Change notifications**: per-key callbacks through the [`NotificationBus`]
//! - **Statistics** (`stats` feature): per-tier hit, miss and eviction counters
//!
//! ## Module Organization
//!
//! - [`template`] - Placeholder parsing, matching and instantiation
//! - `tier` - The [`CacheTier`] surface shared by the local and broadcast tiers
//! - `broadcast` / `transport` - Cross-process mirroring and readiness
//! - `persistent` / `storage` - Durable tier and its backends
//! - `context` - The [`CacheContext`] tying it all together
mod broadcast;
mod cache_entry;
mod config;
mod context;
mod entry_store;
mod error;
mod hook_registry;
mod notification;
mod persistent;
mod readiness;
mod schema;
mod storage;
mod sweeper;
mod tier;
mod transport;

pub mod template;

#[cfg(feature = "stats")]
mod stats;

pub use broadcast::BroadcastTier;
pub use cache_entry::CacheEntry;
pub use config::CacheConfig;
pub use context::{CacheContext, CacheContextBuilder};
pub use entry_store::{EntryStore, Lookup, StoredEntry};
pub use error::{decode, encode, CacheError, Result};
pub use hook_registry::{HookMode, HookRegistry};
pub use notification::{Callback, NotificationBus, Subscription};
pub use persistent::PersistentTier;
pub use readiness::{ReadyHandle, Readiness};
pub use schema::{Schema, SchemaBuilder, SchemaEntry, StaticKey};
pub use storage::{DurableStorage, JsonFileStorage, MemoryStorage};
pub use sweeper::Sweeper;
pub use tier::{CacheTier, LocalTier, MemoryTier, TierKind};
pub use transport::{BroadcastUpdate, MemoryEndpoint, MemoryHub, NoopTransport, Transport};

#[cfg(feature = "stats")]
pub use stats::CacheStats;
