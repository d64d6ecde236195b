//! # Tiercache
//!
//! A multi-tier key/value cache for applications made of several cooperating
//! UI processes.
//!
//! ## Features
//!
//! - **Three tiers**: per-process *local*, cross-process *broadcast* and durable *persistent*
//! - **Typed keys**: declare schema keys with the `#[cache_key]` attribute
//! - **Casual keys**: any runtime string, typed at the call site
//! - **Template keys**: `ocr/provider/${id}` gives every concrete provider key one default
//! - **Lazy TTL**: expired entries are evicted on read and subscribers are told
//! - **Delete guards**: keys claimed by a live consumer cannot be deleted
//! - **Notifications**: per-key change callbacks on every tier
//!
//! ## Quick Start
//!
//! ```rust
//! use tiercache::{cache_key, CacheContext, CacheTier, Schema};
//!
//! #[cache_key(name = "ui.theme", value = "String", default = "system")]
//! pub struct Theme;
//!
//! let ctx = CacheContext::builder()
//!     .schema(Schema::builder().key::<Theme>().build())
//!     .build();
//!
//! let local = ctx.local();
//! assert_eq!(local.get::<Theme>(), "system");
//!
//! local.set::<Theme>("dark".to_string(), None);
//! assert_eq!(local.get::<Theme>(), "dark");
//!
//! assert!(local.delete::<Theme>());
//! assert_eq!(local.get::<Theme>(), "system");
//! ```
//!
//! ## Template Keys
//!
//! ```rust
//! use tiercache::{cache_key, CacheContext, CacheTier, Schema};
//!
//! #[cache_key(name = "ocr/provider/${id}", value = "bool", default = false)]
//! pub struct OcrProviderEnabled;
//!
//! let ctx = CacheContext::builder()
//!     .schema(Schema::builder().key::<OcrProviderEnabled>().build())
//!     .build();
//!
//! // Any concrete key matching the template gets its default
//! assert_eq!(ctx.local().get_casual::<bool>("ocr/provider/system"), Some(false));
//!
//! ctx.local().set_instance::<OcrProviderEnabled>(&["a-1"], true, None);
//! assert!(ctx.local().get_instance::<OcrProviderEnabled>(&["a-1"]));
//! ```
//!
//! ## Delete Guards
//!
//! ```rust
//! use tiercache::{CacheContext, CacheTier};
//!
//! let ctx = CacheContext::builder().build();
//! ctx.local().set_casual("editor.buffer", "draft", None);
//!
//! ctx.register_hook("editor.buffer");
//! assert!(!ctx.local().delete_casual("editor.buffer"));
//!
//! ctx.unregister_hook("editor.buffer");
//! assert!(ctx.local().delete_casual("editor.buffer"));
//! ```
//!
//! See [`CacheContext`] for the broadcast and persistent tiers.

pub use tiercache_core::*;
pub use tiercache_macros::cache_key;
