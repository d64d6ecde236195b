use std::sync::atomic::{AtomicU64, Ordering};

/// Per-tier counters for reads, lazy evictions and guarded deletes.
///
/// All operations use atomic counters with `Relaxed` ordering.
///
/// # Examples
///
/// ```
/// use tiercache_core::CacheStats;
///
/// let stats = CacheStats::new();
///
/// stats.record_hit();
/// stats.record_hit();
/// stats.record_miss();
/// stats.record_eviction();
///
/// assert_eq!(stats.hits(), 2);
/// assert_eq!(stats.misses(), 1);
/// assert_eq!(stats.evictions(), 1);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    rejected_deletes: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            rejected_deletes: AtomicU64::new(0),
        }
    }

    /// A read found a live entry.
    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A read fell back to a default (absent or expired entry).
    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// An expired entry was removed, lazily or by a sweep.
    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// A delete was refused because the key is hooked.
    #[inline]
    pub fn record_rejected_delete(&self) {
        self.rejected_deletes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_deletes(&self) -> u64 {
        self.rejected_deletes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_reads(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Ratio of hits to reads, 0.0 when nothing was read.
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_reads();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.rejected_deletes.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            evictions: AtomicU64::new(self.evictions()),
            rejected_deletes: AtomicU64::new(self.rejected_deletes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats() {
        let stats = CacheStats::new();
        assert_eq!(stats.total_reads(), 0);
        assert_eq!(stats.evictions(), 0);
        assert_eq!(stats.rejected_deletes(), 0);
    }

    #[test]
    fn test_hit_rate_no_reads() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_reset() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_eviction();
        stats.record_rejected_delete();

        stats.reset();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.evictions(), 0);
        assert_eq!(stats.rejected_deletes(), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let stats = CacheStats::new();
        stats.record_hit();

        let cloned = stats.clone();
        stats.record_hit();
        assert_eq!(stats.hits(), 2);
        assert_eq!(cloned.hits(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(CacheStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_hit();
                    }
                    for _ in 0..25 {
                        stats.record_rejected_delete();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.hits(), 800);
        assert_eq!(stats.rejected_deletes(), 200);
    }
}
