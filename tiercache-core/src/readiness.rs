use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::notification::panic_message;

pub(crate) type ReadyCallback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    ready: bool,
    next_id: u64,
    pending: Vec<(u64, ReadyCallback)>,
}

/// One-way readiness flag with a queue of callbacks waiting for it.
///
/// Before [`mark_ready`](Self::mark_ready) callbacks are queued; the flip fires
/// each of them exactly once, in registration order, and discards them. After
/// the flip `on_ready` runs its callback immediately. The flag never goes
/// back to false.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tiercache_core::Readiness;
///
/// let readiness = Readiness::new();
/// let fired = Arc::new(AtomicUsize::new(0));
///
/// let f = fired.clone();
/// let _handle = readiness.on_ready(move || {
///     f.fetch_add(1, Ordering::SeqCst);
/// });
/// assert_eq!(fired.load(Ordering::SeqCst), 0);
///
/// assert!(readiness.mark_ready());
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
///
/// // Already ready: runs synchronously
/// let f = fired.clone();
/// let _handle = readiness.on_ready(move || {
///     f.fetch_add(1, Ordering::SeqCst);
/// });
/// assert_eq!(fired.load(Ordering::SeqCst), 2);
/// ```
pub struct Readiness {
    flag: AtomicBool,
    state: Arc<Mutex<State>>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Queues `callback` until readiness, or runs it now if already ready.
    pub fn on_ready<F>(&self, callback: F) -> ReadyHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.ready {
            drop(state);
            run_guarded(Box::new(callback));
            return ReadyHandle::noop();
        }

        let id = state.next_id;
        state.next_id += 1;
        state.pending.push((id, Box::new(callback)));
        ReadyHandle {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// Flips the flag and fires the queued callbacks.
    ///
    /// Returns `false` if the flag was already set; nothing runs in that case.
    pub fn mark_ready(&self) -> bool {
        match self.take_ready() {
            Some(pending) => {
                self.fire(pending);
                true
            }
            None => false,
        }
    }

    /// Flips the flag and hands back the queued callbacks without running
    /// them, so the caller can finish its own bookkeeping first.
    pub(crate) fn take_ready(&self) -> Option<Vec<ReadyCallback>> {
        let mut state = self.state.lock();
        if state.ready {
            return None;
        }
        state.ready = true;
        self.flag.store(true, Ordering::Release);
        Some(
            std::mem::take(&mut state.pending)
                .into_iter()
                .map(|(_, callback)| callback)
                .collect(),
        )
    }

    pub(crate) fn fire(&self, callbacks: Vec<ReadyCallback>) {
        for callback in callbacks {
            run_guarded(callback);
        }
    }

    /// Number of callbacks still waiting.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Drops queued callbacks without running them. The flag is untouched.
    pub fn clear_pending(&self) {
        self.state.lock().pending.clear();
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("ready", &self.is_ready())
            .field("pending", &self.pending())
            .finish()
    }
}

fn run_guarded(callback: ReadyCallback) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
        tracing::error!(panic = %panic_message(&*payload), "ready callback panicked");
    }
}

/// Cancels a queued ready callback.
///
/// A no-op once the callback has fired, or when it ran synchronously.
#[derive(Debug)]
pub struct ReadyHandle {
    id: u64,
    state: Weak<Mutex<State>>,
}

impl ReadyHandle {
    fn noop() -> Self {
        Self {
            id: 0,
            state: Weak::new(),
        }
    }

    pub fn cancel(self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().pending.retain(|(id, _)| *id != self.id);
        }
    }
}
