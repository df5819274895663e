//! Monotonic time sources for detection timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait representing a monotonic time source used for detection timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic time source for tests and replays.
///
/// Each call to `now()` advances by a fixed step, so timestamps depend only
/// on how many ticks ran and not on scheduling jitter.
pub struct StubTimeSource {
    start: Instant,
    step_ms: u64,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new(step_ms: u64) -> Self {
        Self {
            start: Instant::now(),
            step_ms,
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn step_ms(&self) -> u64 {
        self.step_ms
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new(10)
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(self.step_ms, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_advances_by_step() {
        let clock = StubTimeSource::new(50);
        let first = clock.now();
        let second = clock.now();
        let third = clock.now();
        assert_eq!(second.duration_since(first), Duration::from_millis(50));
        assert_eq!(third.duration_since(first), Duration::from_millis(100));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemTimeSource::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
