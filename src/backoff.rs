//! Backoff policies for the retry decorator.
//!
//! A [`BackoffPolicy`] maps a retry attempt number to a wait duration. Attempt semantics: attempt
//! `0` is the initial admission attempt (no delay), retries start at `attempt = 1`.
//!
//! [`Backoff`] is deterministic (constant, linear, exponential with an optional cap).
//! [`JitteredBackoff`] layers a [`Jitter`] and a floor on top of it. The gateway default is
//! [`exponential_full_jitter`], a uniform draw between zero and an exponentially growing ceiling.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use gatewarden::{Backoff, BackoffPolicy};
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(0)); // initial attempt
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//! assert_eq!(backoff.delay(6), Duration::from_secs(2)); // capped
//! ```
//!
//! Overflow behavior: computations that would overflow saturate to `MAX_BACKOFF` (1 day).

use std::fmt;
use std::time::Duration;

use crate::jitter::Jitter;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Default base of the exponential full-jitter policy (nanoseconds).
pub const DEFAULT_BASE_NANOS: u64 = 2000;
/// Default floor of the exponential full-jitter policy (nanoseconds).
pub const DEFAULT_MIN_NANOS: u64 = 0;
/// Default ceiling of the exponential full-jitter policy (nanoseconds).
pub const DEFAULT_MAX_NANOS: u64 = 1 << 21;

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    ConstantDoesNotSupportMax,
    MaxMustBePositive,
    MaxLessThanBase { base: Duration, max: Duration },
    MinGreaterThanMax { min: Duration, max: Duration },
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::ConstantDoesNotSupportMax => {
                write!(f, "with_max is only valid for Linear or Exponential backoff")
            }
            BackoffError::MaxMustBePositive => write!(f, "max must be greater than zero"),
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max ({:?}) must be >= base ({:?})", max, base)
            }
            BackoffError::MinGreaterThanMax { min, max } => {
                write!(f, "min ({:?}) must be <= max ({:?})", min, max)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

/// Maps a retry attempt to the delay that precedes it.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    fn delay(&self, attempt: usize) -> Duration;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BackoffKind {
    Constant { delay: Duration },
    Linear { base: Duration, max: Option<Duration> },
    Exponential { base: Duration, max: Option<Duration> },
}

impl BackoffKind {
    fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            BackoffKind::Constant { delay } => *delay,
            BackoffKind::Linear { base, max } => {
                let attempt_u32 = attempt.min(u32::MAX as usize) as u32;
                let linear = base.checked_mul(attempt_u32).unwrap_or(MAX_BACKOFF);
                max.map(|m| linear.min(m)).unwrap_or(linear).min(MAX_BACKOFF)
            }
            BackoffKind::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(u32::MAX as usize) as u32;
                let multiplier = 2u128.saturating_pow(exponent);
                let nanos = base.as_nanos().saturating_mul(multiplier);
                let exp_delay = Duration::from_nanos(nanos.min(MAX_BACKOFF.as_nanos()) as u64);
                max.map(|m| exp_delay.min(m)).unwrap_or(exp_delay).min(MAX_BACKOFF)
            }
        }
    }
}

/// Deterministic backoff: constant, linear, or exponential growth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
}

impl Backoff {
    /// Create a constant backoff strategy
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant { delay } }
    }

    /// Create a linear backoff strategy
    pub fn linear(base: Duration) -> Self {
        Self { kind: BackoffKind::Linear { base, max: None } }
    }

    /// Create an exponential backoff strategy
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential { base, max: None } }
    }

    /// Set a maximum delay for the backoff (linear or exponential).
    /// Returns an error if called on `Constant`, if `max` is zero, or if `max < base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match &mut self.kind {
            BackoffKind::Linear { base, max: existing }
            | BackoffKind::Exponential { base, max: existing } => {
                if max < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            BackoffKind::Constant { .. } => Err(BackoffError::ConstantDoesNotSupportMax),
        }
    }

    /// Calculate the delay for a given attempt number (0 = initial attempt, no delay).
    pub fn delay(&self, attempt: usize) -> Duration {
        self.kind.delay(attempt)
    }
}

impl BackoffPolicy for Backoff {
    fn delay(&self, attempt: usize) -> Duration {
        self.kind.delay(attempt)
    }
}

/// Backoff randomized by a [`Jitter`] and never shorter than `min`.
///
/// When the deterministic ceiling for an attempt is still below `min`, `min` is used as the
/// ceiling, so every retry waits within `[min, max(min, ceiling)]`.
#[derive(Debug, Clone)]
pub struct JitteredBackoff {
    backoff: Backoff,
    jitter: Jitter,
    min: Duration,
}

impl JitteredBackoff {
    pub fn new(backoff: Backoff, jitter: Jitter) -> Self {
        Self { backoff, jitter, min: Duration::ZERO }
    }

    /// Floor applied after jitter; retries never wait less than `min`.
    pub fn with_min(mut self, min: Duration) -> Self {
        self.min = min;
        self
    }

    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    pub fn min(&self) -> Duration {
        self.min
    }
}

impl BackoffPolicy for JitteredBackoff {
    fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        // the floor wins over a ceiling that has not grown past it yet
        let ceiling = self.backoff.delay(attempt).max(self.min);
        self.jitter.apply(ceiling).max(self.min)
    }
}

/// Exponential growth from `base`, capped at `max`, with full jitter and a floor of `min`.
pub fn exponential_full_jitter(
    base: Duration,
    min: Duration,
    max: Duration,
) -> Result<JitteredBackoff, BackoffError> {
    if min > max {
        return Err(BackoffError::MinGreaterThanMax { min, max });
    }
    let backoff = Backoff::exponential(base).with_max(max)?;
    Ok(JitteredBackoff::new(backoff, Jitter::full()).with_min(min))
}

/// The gateway default: base 2000ns, floor 0, ceiling 2^21ns.
pub fn default_policy() -> JitteredBackoff {
    JitteredBackoff::new(
        Backoff {
            kind: BackoffKind::Exponential {
                base: Duration::from_nanos(DEFAULT_BASE_NANOS),
                max: Some(Duration::from_nanos(DEFAULT_MAX_NANOS)),
            },
        },
        Jitter::full(),
    )
    .with_min(Duration::from_nanos(DEFAULT_MIN_NANOS))
}
