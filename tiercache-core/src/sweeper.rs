use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
struct Signal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Background thread running a sweep task at a fixed interval.
///
/// The task returns `false` to stop the thread (e.g. when the cache it
/// sweeps is gone). Dropping the `Sweeper` stops and joins the thread.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tiercache_core::Sweeper;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let r = runs.clone();
/// let sweeper = Sweeper::spawn(Duration::from_millis(5), move || {
///     r.fetch_add(1, Ordering::SeqCst);
///     true
/// })
/// .unwrap();
///
/// std::thread::sleep(Duration::from_millis(50));
/// drop(sweeper);
/// assert!(runs.load(Ordering::SeqCst) > 0);
/// ```
pub struct Sweeper {
    interval: Duration,
    signal: Arc<Signal>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn spawn<F>(interval: Duration, mut task: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let thread_signal = signal.clone();

        let handle = thread::Builder::new()
            .name("tiercache-sweeper".to_string())
            .spawn(move || {
                tracing::debug!(interval_ms = interval.as_millis() as u64, "expiry sweeper started");
                loop {
                    {
                        let mut stopped = thread_signal.stopped.lock();
                        if !*stopped {
                            thread_signal.wake.wait_for(&mut stopped, interval);
                        }
                        if *stopped {
                            break;
                        }
                    }
                    if !task() {
                        break;
                    }
                }
                tracing::debug!("expiry sweeper stopped");
            })?;

        Ok(Self {
            interval,
            signal,
            handle: Some(handle),
        })
    }

    /// Signals the thread to stop and waits for it.
    pub fn stop(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();

        if let Some(handle) = self.handle.take() {
            // The last context reference may be dropped by the sweeper itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("expiry sweeper thread panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("interval", &self.interval)
            .field("running", &self.handle.is_some())
            .finish()
    }
}
