//! Stop signal for maintenance threads.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cooperative stop signal shared between a scheduler and its threads.
///
/// `stop()` wakes every thread blocked in `wait_timeout()` immediately.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Wakes all waiters.
    pub fn stop(&self) {
        *self.inner.stopped.lock() = true;
        self.inner.condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep for at most `duration`, waking early on `stop()`.
    /// Returns `true` if a stop was requested.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self.inner.stopped.lock();
        while !*stopped {
            if self
                .inner
                .condvar
                .wait_until(&mut stopped, deadline)
                .timed_out()
            {
                break;
            }
        }
        *stopped
    }
}
