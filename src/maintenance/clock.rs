//! Wait points of the maintenance loops.

use std::time::Duration;

use super::StopSignal;

/// How a maintenance task waits between cycles
pub trait Clock: Send + Sync {
    /// Wait for `duration` or until `stop` fires.
    /// Returns `true` if the task should exit.
    fn sleep(&self, duration: Duration, stop: &StopSignal) -> bool;
}

/// Real time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration, stop: &StopSignal) -> bool {
        stop.wait_timeout(duration)
    }
}
