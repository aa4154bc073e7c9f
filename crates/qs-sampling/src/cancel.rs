//! Cooperative cancellation for sampling windows.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest stretch a sampling task sleeps before looking at the token again.
const POLL_SLICE: Duration = Duration::from_millis(5);

/// Shared flag a caller sets to abort sampling in progress.
///
/// Clones observe the same flag. Cancellation is sticky: once cancelled a
/// token stays cancelled, so a fresh token is needed per operation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if the token is cancelled.
    ///
    /// Returns `false` if the sleep was cut short by cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        sleep_unless(duration, || self.is_cancelled())
    }
}

/// Sleep for `duration` in short slices, returning `false` as soon as
/// `stop()` reports true.
pub(crate) fn sleep_unless(duration: Duration, stop: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(POLL_SLICE));
    }
}
