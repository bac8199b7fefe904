use std::{cell::Cell, rc::Rc, time::Duration, time::Instant};

/// Source of time for the scheduler and the timed leaves.
///
/// Readings are offsets from an arbitrary origin fixed at the clock's creation.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Block until `deadline`. Virtual clocks jump straight to it.
    fn sleep_until(&self, deadline: Duration);
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// A virtual clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give another
/// to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::default();
        let handle = clock.clone();
        handle.advance_ms(250);
        assert_eq!(clock.now(), Duration::from_millis(250));
        clock.sleep_until(Duration::from_millis(100));
        assert_eq!(handle.now(), Duration::from_millis(250));
        clock.sleep_until(Duration::from_secs(1));
        assert_eq!(handle.now(), Duration::from_secs(1));
    }
}
