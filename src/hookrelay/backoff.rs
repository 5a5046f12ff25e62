//! Retry delays for the update loop.
//!
//! The delay for attempt `n` is `first * factor^n`, capped at `max`. With
//! jitter enabled a uniformly random share of up to half the delay is
//! subtracted, so restarting relays do not hammer the API in lockstep.

use std::time::Duration;

use rand::Rng;

#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    pub first: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-indexed)
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        if self.jitter && !base.is_zero() {
            let cut = rand::rng().random_range(0.0..=base.as_secs_f64() / 2.0);
            base.saturating_sub(Duration::from_secs_f64(cut))
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn grows_geometrically() {
        let policy = plain();
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn caps_at_max() {
        let policy = plain();
        assert_eq!(policy.next(10), Duration::from_secs(10));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_half_of_base() {
        let policy = BackoffPolicy { jitter: true, ..plain() };
        for _ in 0..100 {
            let delay = policy.next(2);
            assert!(delay >= Duration::from_millis(200) && delay <= Duration::from_millis(400));
        }
    }
}
