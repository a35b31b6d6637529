//! Time source for the scheduler.
//!
//! Timeouts and deadlines are compared against [`Clock::now`] during each
//! task's own update, so swapping in a [`ManualClock`] makes every
//! time-dependent rule deterministic under test.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::types::{offset_secs, Timestamp};

/// Provides the current time.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        crate::types::now()
    }
}

/// Clock that only moves when told to.
///
/// Cloning shares the underlying instant, so a test can keep one handle and
/// give another to the scheduler.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by fractional seconds
    ///
    /// A step that would leave the representable range is ignored.
    pub fn advance_secs(&self, seconds: f64) {
        let mut current = self.current.lock();
        match offset_secs(*current, seconds) {
            Some(next) => *current = next,
            None => tracing::warn!("Ignoring clock step of {}s: out of range", seconds),
        }
    }

    pub fn set(&self, instant: Timestamp) {
        *self.current.lock() = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(crate::types::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_system_clock_returns_current_time() {
        let before = crate::types::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        let start = clock.now();

        handle.advance_secs(1.5);

        assert_eq!(clock.now() - start, Duration::milliseconds(1500));
    }

    #[test]
    fn test_manual_clock_ignores_out_of_range_step() {
        let clock = ManualClock::default();
        let start = clock.now();

        clock.advance_secs(1e13);
        assert_eq!(clock.now(), start);

        clock.advance_secs(2.0);
        assert_eq!(clock.now() - start, Duration::seconds(2));
    }
}
