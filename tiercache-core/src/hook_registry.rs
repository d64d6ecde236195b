use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// How the [`HookRegistry`] tracks claims on a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    /// Boolean membership (default). A key registered by two consumers becomes
    /// deletable as soon as either of them unregisters.
    #[default]
    Presence,
    /// Reference counting. A key stays guarded until every registration has
    /// been matched by an unregistration.
    Counted,
}

impl From<&str> for HookMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "counted" | "count" | "refcount" => HookMode::Counted,
            _ => HookMode::Presence,
        }
    }
}

/// Set of keys currently claimed by at least one live consumer.
///
/// The registry guards `delete` on both the local and the broadcast tier and
/// is keyed by name only: registering `"ui.theme"` protects that key in both
/// tiers.
///
/// # Examples
///
/// ```
/// use tiercache_core::{HookMode, HookRegistry};
///
/// let hooks = HookRegistry::new(HookMode::Presence);
/// hooks.register("ui.theme");
/// hooks.register("ui.theme");
/// assert!(hooks.is_registered("ui.theme"));
///
/// // Presence mode: one unregister releases the key
/// hooks.unregister("ui.theme");
/// assert!(!hooks.is_registered("ui.theme"));
///
/// let counted = HookRegistry::new(HookMode::Counted);
/// counted.register("ui.theme");
/// counted.register("ui.theme");
/// counted.unregister("ui.theme");
/// assert!(counted.is_registered("ui.theme"));
/// ```
#[derive(Debug, Default)]
pub struct HookRegistry {
    mode: HookMode,
    claims: DashMap<String, usize>,
}

impl HookRegistry {
    pub fn new(mode: HookMode) -> Self {
        Self {
            mode,
            claims: DashMap::new(),
        }
    }

    pub fn mode(&self) -> HookMode {
        self.mode
    }

    pub fn register(&self, key: &str) {
        let mut claims = self.claims.entry(key.to_string()).or_insert(0);
        *claims = match self.mode {
            HookMode::Presence => 1,
            HookMode::Counted => claims.saturating_add(1),
        };
    }

    /// Releases a claim. Unregistering an unknown key is a no-op.
    pub fn unregister(&self, key: &str) {
        match self.mode {
            HookMode::Presence => {
                self.claims.remove(key);
            }
            HookMode::Counted => {
                self.claims.remove_if_mut(key, |_, claims| {
                    *claims = claims.saturating_sub(1);
                    *claims == 0
                });
            }
        }
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.claims.get(key).map_or(false, |claims| *claims > 0)
    }

    /// Number of live claims on a key (0 or 1 in presence mode).
    pub fn claims(&self, key: &str) -> usize {
        self.claims.get(key).map_or(0, |claims| *claims)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn clear(&self) {
        self.claims.clear();
    }
}
