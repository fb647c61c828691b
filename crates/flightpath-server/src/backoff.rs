//! Exponential backoff with jitter for the weather provider.
//!
//! After a failed request the provider refuses to call out again until the
//! delay expires, so an outage degrades scoring immediately instead of
//! stalling every waypoint on its own timeout.

use rand::Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
    retry_at: Option<Instant>,
    jitter_ratio: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            current: base,
            failures: 0,
            retry_at: None,
            jitter_ratio: 0.2,
        }
    }

    pub fn ready(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Time left before the next attempt is allowed.
    pub fn remaining(&self) -> Duration {
        self.retry_at
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        self.current = self.base;
        self.failures = 0;
        self.retry_at = None;
    }

    /// Register a failure and return the delay before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        if self.failures > 0 {
            self.current = self.current.saturating_mul(2).min(self.max);
        }
        self.failures = self.failures.saturating_add(1);
        let delay = with_jitter(self.current, self.jitter_ratio);
        self.retry_at = Some(Instant::now() + delay);
        delay
    }
}

fn with_jitter(delay: Duration, ratio: f64) -> Duration {
    let max_extra = delay.as_millis() as f64 * ratio.clamp(0.0, 1.0);
    if max_extra < 1.0 {
        return delay;
    }
    let extra = rand::rng().random_range(0.0..=max_extra);
    delay + Duration::from_millis(extra as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_backoff_allows_requests() {
        let backoff = Backoff::new(Duration::from_millis(10), Duration::from_secs(1));
        assert!(backoff.ready());
        assert_eq!(backoff.remaining(), Duration::ZERO);
    }

    #[test]
    fn failure_blocks_until_success() {
        let mut backoff = Backoff::new(Duration::from_millis(200), Duration::from_secs(5));
        let delay = backoff.record_failure();
        assert!(delay >= Duration::from_millis(200));
        assert!(delay <= Duration::from_millis(240));
        assert!(!backoff.ready());
        assert_eq!(backoff.failures(), 1);

        backoff.record_success();
        assert!(backoff.ready());
        assert_eq!(backoff.failures(), 0);
    }

    #[test]
    fn delay_doubles_and_saturates() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(300));
        let first = backoff.record_failure();
        let second = backoff.record_failure();
        let third = backoff.record_failure();
        assert!(first < Duration::from_millis(121));
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(240));
        assert!(third >= Duration::from_millis(300) && third <= Duration::from_millis(360));
    }
}
