// Call-rate limiter for refresh paths.
//
// Read paths call refresh eagerly; the throttle decides which of those
// calls actually hit the vendor. The stamp is taken when a run is
// granted, not when it finishes, so concurrent callers during a slow
// refresh are also suppressed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct Throttle {
    min_interval: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl Throttle {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_run: Mutex::new(None),
        }
    }

    /// Returns `true` and stamps the clock if enough time has passed
    /// since the last granted run.
    pub(crate) fn should_run(&self) -> bool {
        let mut last_run = match self.last_run.lock() {
            Ok(guard) => guard,
            // A poisoned stamp only ever delays one refresh cycle.
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        match *last_run {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                *last_run = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_runs_then_suppresses() {
        let throttle = Throttle::new(Duration::from_secs(3600));
        assert!(throttle.should_run());
        assert!(!throttle.should_run());
        assert!(!throttle.should_run());
    }

    #[test]
    fn zero_interval_always_runs() {
        let throttle = Throttle::new(Duration::ZERO);
        assert!(throttle.should_run());
        assert!(throttle.should_run());
    }
}
