//! Jitter strategies to keep retrying callers from waking in lockstep.
//!
//! - `None`: deterministic delays for tests or tightly controlled workflows.
//! - `Full`: uniform in `[0, delay]`, the gateway default.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor while adding randomness.
//!
//! Draws are made at nanosecond precision since gateway backoff ceilings are often well below a
//! millisecond. Durations that do not fit in `u64` nanoseconds saturate instead of panicking.

use rand::{rng, Rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter strategy for randomizing retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// No jitter - use exact backoff delay
    None,
    /// Full jitter: random between 0 and delay
    #[default]
    Full,
    /// Equal jitter: random between delay/2 and delay
    Equal,
}

impl Jitter {
    /// Create a full jitter strategy
    pub fn full() -> Self {
        Jitter::Full
    }

    /// Create an equal jitter strategy
    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration) -> Duration {
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a custom RNG (for testing)
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let nanos = as_nanos_saturated(delay);
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                if nanos == 0 {
                    return Duration::ZERO;
                }
                Duration::from_nanos(rng.random_range(0..=nanos))
            }
            Jitter::Equal => {
                if nanos == 0 {
                    return Duration::ZERO;
                }
                Duration::from_nanos(rng.random_range(nanos / 2..=nanos))
            }
        }
    }
}

fn as_nanos_saturated(duration: Duration) -> u64 {
    duration.as_nanos().try_into().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn none_jitter_returns_exact_delay() {
        let delay = Duration::from_secs(1);
        assert_eq!(Jitter::None.apply(delay), delay);
    }

    #[test]
    fn full_jitter_is_between_zero_and_delay() {
        let jitter = Jitter::full();
        let delay = Duration::from_secs(1);
        for _ in 0..100 {
            assert!(jitter.apply(delay) <= delay);
        }
    }

    #[test]
    fn equal_jitter_is_between_half_and_delay() {
        let jitter = Jitter::equal();
        let delay = Duration::from_secs(1);
        for _ in 0..100 {
            let jittered = jitter.apply(delay);
            assert!(jittered <= delay);
            assert!(jittered >= Duration::from_millis(500));
        }
    }

    #[test]
    fn sub_millisecond_delays_still_jitter() {
        let mut rng = StdRng::seed_from_u64(7);
        let delay = Duration::from_nanos(2000);
        let draws: Vec<Duration> =
            (0..32).map(|_| Jitter::full().apply_with_rng(delay, &mut rng)).collect();
        assert!(draws.iter().all(|d| *d <= delay));
        assert!(draws.iter().any(|d| *d > Duration::ZERO), "draws should not collapse to zero");
    }

    #[test]
    fn jitter_handles_zero_delay() {
        assert_eq!(Jitter::full().apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(Jitter::equal().apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn saturates_large_durations_without_panicking() {
        let huge = Duration::from_secs(u64::MAX);
        let mut rng = StdRng::seed_from_u64(999);
        let jittered = Jitter::full().apply_with_rng(huge, &mut rng);
        assert!(jittered <= Duration::from_nanos(u64::MAX));
    }
}
