//! Backoff strategies for [`crate::RetryPolicy`] (spec §4.4).

use std::time::Duration;

/// Default maximum delay for [`Backoff::Exponential`] when none is given:
/// 5 minutes, per spec §4.4.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5 * 60);

/// How the delay between retry attempts grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// A constant delay between attempts.
    Fixed(Duration),
    /// `min(initial * multiplier^(attempt - 1), max_delay)`.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Multiplier applied per subsequent attempt; must be `>= 1.0`.
        multiplier: f64,
        /// Upper bound on the delay.
        max_delay: Duration,
    },
}

impl Backoff {
    /// Construct an exponential backoff using the spec's default 5-minute
    /// cap.
    pub fn exponential(initial: Duration, multiplier: f64) -> Self {
        Self::Exponential {
            initial,
            multiplier,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// The delay before the `attempt`-th retry (1-based: the first retry
    /// is `attempt == 1`).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential {
                initial,
                multiplier,
                max_delay,
            } => {
                let exponent = attempt.saturating_sub(1);
                let scaled = initial.as_secs_f64() * multiplier.powi(exponent as i32);
                let capped = scaled.min(max_delay.as_secs_f64());
                Duration::from_secs_f64(capped.max(0.0))
            }
        }
    }
}

impl Default for Backoff {
    /// Exponential, starting at 200ms, doubling, capped at the spec's
    /// 5-minute default.
    fn default() -> Self {
        Self::exponential(Duration::from_millis(200), 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let b = Backoff::Fixed(Duration::from_millis(10));
        assert_eq!(b.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(b.delay_for_attempt(5), Duration::from_millis(10));
    }

    #[test]
    fn exponential_doubles_and_caps() {
        let b = Backoff::Exponential {
            initial: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(1000),
        };
        assert_eq!(b.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(b.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(b.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(b.delay_for_attempt(10), Duration::from_millis(1000));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn exponential_never_exceeds_max_delay(
                initial_ms in 1u64..10_000,
                multiplier in 1.0f64..8.0,
                max_delay_ms in 1u64..600_000,
                attempt in 1u32..40,
            ) {
                let backoff = Backoff::Exponential {
                    initial: Duration::from_millis(initial_ms),
                    multiplier,
                    max_delay: Duration::from_millis(max_delay_ms),
                };
                prop_assert!(backoff.delay_for_attempt(attempt) <= Duration::from_millis(max_delay_ms));
            }

            // A multiplier >= 1 never shrinks the delay between consecutive
            // attempts, up to the cap.
            #[test]
            fn exponential_delay_is_non_decreasing_in_attempt(
                initial_ms in 1u64..10_000,
                multiplier in 1.0f64..8.0,
                max_delay_ms in 1u64..600_000,
                attempt in 1u32..39,
            ) {
                let backoff = Backoff::Exponential {
                    initial: Duration::from_millis(initial_ms),
                    multiplier,
                    max_delay: Duration::from_millis(max_delay_ms),
                };
                prop_assert!(backoff.delay_for_attempt(attempt) <= backoff.delay_for_attempt(attempt + 1));
            }

            #[test]
            fn fixed_is_constant_across_attempts(
                millis in 0u64..600_000,
                attempt in 1u32..40,
            ) {
                let backoff = Backoff::Fixed(Duration::from_millis(millis));
                prop_assert_eq!(backoff.delay_for_attempt(attempt), Duration::from_millis(millis));
            }
        }
    }

    #[test]
    fn multiplier_of_one_is_equivalent_to_fixed() {
        let exp = Backoff::Exponential {
            initial: Duration::from_millis(50),
            multiplier: 1.0,
            max_delay: Duration::from_secs(10),
        };
        let fixed = Backoff::Fixed(Duration::from_millis(50));
        for attempt in 1..=5 {
            assert_eq!(exp.delay_for_attempt(attempt), fixed.delay_for_attempt(attempt));
        }
    }
}
