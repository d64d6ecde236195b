//! # Notification bus
//!
//! Per-key subscriber lists for one tier. Every mutation of a key (set,
//! successful delete, lazy eviction, sweep) calls [`NotificationBus::notify`],
//! which invokes the key's callbacks synchronously, in subscription order.
//!
//! Callbacks run with no lock held, so they may read or write the cache. A
//! callback that panics is caught and logged; the remaining callbacks for the
//! same key still run and the mutation that triggered the notification is not
//! affected.

use dashmap::DashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::TierKind;

/// Zero-argument change signal.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    by_key: DashMap<String, Vec<(u64, Callback)>>,
    next_id: AtomicU64,
}

/// Subscriber sets for every key of one tier.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tiercache_core::{NotificationBus, TierKind};
///
/// let bus = NotificationBus::new(TierKind::Local);
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = hits.clone();
/// let subscription = bus.subscribe("ui.theme", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.notify("ui.theme");
/// bus.notify("other.key");
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
///
/// subscription.unsubscribe();
/// bus.notify("ui.theme");
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct NotificationBus {
    tier: TierKind,
    inner: Arc<Subscribers>,
}

impl NotificationBus {
    pub fn new(tier: TierKind) -> Self {
        Self {
            tier,
            inner: Arc::new(Subscribers::default()),
        }
    }

    /// Registers `callback` for changes to `key`.
    ///
    /// The returned [`Subscription`] is the only way to cancel; dropping it
    /// leaves the callback registered.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .by_key
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        Subscription {
            key: key.to_string(),
            id,
            subscribers: Arc::downgrade(&self.inner),
        }
    }

    /// Invokes every callback subscribed to `key` and returns how many ran
    /// to completion.
    pub fn notify(&self, key: &str) -> usize {
        // Snapshot so that callbacks can (un)subscribe without deadlocking
        let callbacks: Vec<Callback> = match self.inner.by_key.get(key) {
            Some(list) => list.iter().map(|(_, cb)| cb.clone()).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(
                        tier = %self.tier,
                        key,
                        panic = %panic_message(&*payload),
                        "cache subscriber panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Number of callbacks subscribed to `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.by_key.get(key).map_or(0, |list| list.len())
    }

    /// Number of keys with at least one subscriber.
    pub fn key_count(&self) -> usize {
        self.inner.by_key.len()
    }

    /// Drops every subscription. Outstanding [`Subscription`] handles become no-ops.
    pub fn clear(&self) {
        self.inner.by_key.clear();
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("tier", &self.tier)
            .field("keys", &self.key_count())
            .finish()
    }
}

/// Handle returned by [`NotificationBus::subscribe`].
#[must_use = "a subscription can only be cancelled through its handle"]
#[derive(Debug)]
pub struct Subscription {
    key: String,
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Removes this callback only. Empty subscriber lists are pruned.
    pub fn unsubscribe(self) {
        let Some(subscribers) = self.subscribers.upgrade() else {
            return;
        };
        subscribers.by_key.remove_if_mut(&self.key, |_, list| {
            list.retain(|(id, _)| *id != self.id);
            list.is_empty()
        });
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("keys", &self.by_key.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_notify_only_matching_key() {
        let bus = NotificationBus::new(TierKind::Local);
        let (count, cb) = counter();
        let _sub = bus.subscribe("a", cb);

        assert_eq!(bus.notify("b"), 0);
        assert_eq!(bus.notify("a"), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callbacks_run_in_subscription_order() {
        let bus = NotificationBus::new(TierKind::Local);
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for i in 0..3 {
            let order = order.clone();
            subs.push(bus.subscribe("k", move || order.lock().push(i)));
        }
        bus.notify("k");
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = NotificationBus::new(TierKind::Broadcast);
        let (before, cb_before) = counter();
        let (after, cb_after) = counter();
        let _a = bus.subscribe("k", cb_before);
        let _b = bus.subscribe("k", || panic!("boom"));
        let _c = bus.subscribe("k", cb_after);

        assert_eq!(bus.notify("k"), 2);
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_callback() {
        let bus = NotificationBus::new(TierKind::Local);
        let (first, cb1) = counter();
        let (second, cb2) = counter();
        let sub1 = bus.subscribe("k", cb1);
        let _sub2 = bus.subscribe("k", cb2);

        sub1.unsubscribe();
        bus.notify("k");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count("k"), 1);
    }

    #[test]
    fn test_empty_key_is_pruned() {
        let bus = NotificationBus::new(TierKind::Local);
        let sub = bus.subscribe("k", || {});
        assert_eq!(bus.key_count(), 1);
        sub.unsubscribe();
        assert_eq!(bus.key_count(), 0);
    }

    #[test]
    fn test_dropping_handle_keeps_subscription() {
        let bus = NotificationBus::new(TierKind::Local);
        let (count, cb) = counter();
        drop(bus.subscribe("k", cb));
        bus.notify("k");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_during_notify() {
        let bus = Arc::new(NotificationBus::new(TierKind::Local));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (count, cb) = counter();

        let slot_in_cb = slot.clone();
        let sub = bus.subscribe("k", move || {
            cb();
            if let Some(sub) = slot_in_cb.lock().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        bus.notify("k");
        bus.notify("k");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_clear_is_noop() {
        let bus = NotificationBus::new(TierKind::Local);
        let sub = bus.subscribe("k", || {});
        bus.clear();
        sub.unsubscribe();
        assert_eq!(bus.key_count(), 0);
    }
}
