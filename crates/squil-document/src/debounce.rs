//! Coalescing timer for deferred notifications.
//!
//! Rapid edits should produce one change notification, not one per
//! keystroke. [`Debouncer`] keeps at most one pending action: scheduling
//! replaces any previously scheduled action and restarts the delay, so only
//! the most recent action runs once the burst settles. `flush` runs the
//! pending action immediately and `cancel` discards it; in every case an
//! action runs at most once.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

type Action = Box<dyn FnOnce() + Send>;

struct Inner {
    /// Bumped on every schedule, flush, and cancel, always while holding
    /// the `pending` lock; a sleeping timer task only fires if the
    /// generation it captured is still current when it re-checks under
    /// that same lock.
    generation: AtomicU64,
    pending: Mutex<Option<Action>>,
}

/// Runs the most recently scheduled action after a quiet period.
///
/// Timer tasks are spawned on the ambient Tokio runtime; `schedule` must be
/// called within one.
pub struct Debouncer {
    delay: Duration,
    inner: Arc<Inner>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        }
    }

    /// Schedules `action` to run after the delay, replacing any action that
    /// is already pending.
    pub fn schedule(&self, action: impl FnOnce() + Send + 'static) {
        let generation = {
            let mut pending = self.inner.pending.lock();
            *pending = Some(Box::new(action));
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        trace!(delay_ms = self.delay.as_millis() as u64, "debounce scheduled");

        let inner = Arc::clone(&self.inner);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let action = {
                let mut pending = inner.pending.lock();
                if inner.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                pending.take()
            };
            if let Some(action) = action {
                action();
            }
        });
    }

    /// Runs the pending action now, if there is one.
    pub fn flush(&self) {
        let action = {
            let mut pending = self.inner.pending.lock();
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            pending.take()
        };
        if let Some(action) = action {
            trace!("debounce flushed");
            action();
        }
    }

    /// Discards the pending action without running it.
    pub fn cancel(&self) {
        let mut pending = self.inner.pending.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        pending.take();
    }

    /// Whether an action is waiting to fire.
    pub fn has_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }
}
