//! Deadline-based debouncing.
//!
//! Bursts of calls collapse into one run `interval` after the last call.
//! The owner polls [`Debouncer::fire_due`] from its event loop.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Postpone the pending run to `interval` after `now`.
    pub fn call(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending run if its deadline has passed.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_burst_collapses_to_one_run() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(250));
        d.call(t0);
        d.call(t0 + ms(100));
        d.call(t0 + ms(200));

        assert!(!d.fire_due(t0 + ms(300)));
        assert!(d.fire_due(t0 + ms(450)));
        assert!(!d.fire_due(t0 + ms(1000)));
    }

    #[test]
    fn test_cancel() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(200));
        d.call(t0);
        assert!(d.is_pending());
        d.cancel();
        assert!(!d.fire_due(t0 + ms(500)));
    }
}
