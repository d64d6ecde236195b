use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::HookMode;

/// Runtime options for a [`CacheContext`](crate::CacheContext).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tiercache_core::{CacheConfig, HookMode};
///
/// let config = CacheConfig::default()
///     .with_hook_mode(HookMode::Counted)
///     .with_sweep_interval(Duration::from_secs(30));
///
/// assert_eq!(config.hook_mode, HookMode::Counted);
/// assert_eq!(config.sweep_interval, Some(Duration::from_secs(30)));
/// assert!(!config.start_ready);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Delete guard semantics shared by the local and broadcast tiers.
    pub hook_mode: HookMode,
    /// Period of the background expiry sweep. `None` keeps expiry lazy.
    pub sweep_interval: Option<Duration>,
    /// Open the broadcast readiness barrier at construction, for a surface
    /// with no peer to sync from.
    pub start_ready: bool,
}

impl CacheConfig {
    pub const fn new() -> Self {
        Self {
            hook_mode: HookMode::Presence,
            sweep_interval: None,
            start_ready: false,
        }
    }

    pub fn with_hook_mode(mut self, mode: HookMode) -> Self {
        self.hook_mode = mode;
        self
    }

    /// Enables the background sweep. A zero interval disables it.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn with_start_ready(mut self, start_ready: bool) -> Self {
        self.start_ready = start_ready;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_faithful_behaviour() {
        let config = CacheConfig::default();
        assert_eq!(config.hook_mode, HookMode::Presence);
        assert_eq!(config.sweep_interval, None);
        assert!(!config.start_ready);
    }

    #[test]
    fn test_zero_sweep_interval_disables() {
        let config = CacheConfig::new().with_sweep_interval(Duration::ZERO);
        assert_eq!(config.sweep_interval, None);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: CacheConfig = serde_json::from_str(r#"{"hook_mode": "counted"}"#).unwrap();
        assert_eq!(config.hook_mode, HookMode::Counted);
        assert_eq!(config.sweep_interval, None);
    }
}
