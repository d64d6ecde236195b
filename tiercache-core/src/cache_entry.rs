use std::time::{Duration, Instant};

/// A stored value together with its optional expiry deadline.
///
/// Entries are owned by a tier's [`EntryStore`](crate::EntryStore) and are
/// replaced wholesale on every `set`: the value and the deadline are never
/// merged with a previous entry.
///
/// # Type Parameters
///
/// * `V` - The type of the stored value (`serde_json::Value` inside the tiers)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tiercache_core::CacheEntry;
///
/// let entry = CacheEntry::new(42, Some(Duration::from_secs(60)));
/// assert_eq!(entry.value, 42);
/// assert!(entry.has_ttl());
/// assert!(!entry.is_expired());
///
/// // A zero TTL is treated as "no TTL"
/// let forever = CacheEntry::new("data", Some(Duration::ZERO));
/// assert!(!forever.has_ttl());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expire_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    /// Creates a new entry expiring `ttl` from now.
    ///
    /// `None` and `Some(Duration::ZERO)` both produce an entry that never expires.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        let expire_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl));
        Self { value, expire_at }
    }

    /// Returns true if the entry carries an expiry deadline.
    pub fn has_ttl(&self) -> bool {
        self.expire_at.is_some()
    }

    /// Returns true if the deadline has passed.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::thread;
    /// use std::time::Duration;
    /// use tiercache_core::CacheEntry;
    ///
    /// let entry = CacheEntry::new("data", Some(Duration::from_millis(20)));
    /// assert!(!entry.is_expired());
    ///
    /// thread::sleep(Duration::from_millis(40));
    /// assert!(entry.is_expired());
    /// ```
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns true if the deadline is at or before `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expire_at {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    /// Lifetime left at `now`, or `None` for entries without TTL.
    ///
    /// An expired entry reports `Some(Duration::ZERO)`.
    pub fn remaining_ttl_at(&self, now: Instant) -> Option<Duration> {
        self.expire_at
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
