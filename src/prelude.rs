//! Convenient re-exports for common Gatewarden types.
pub use crate::{
    backoff::{exponential_full_jitter, Backoff, BackoffPolicy, JitteredBackoff},
    config::{BackoffSpec, LimiterSpec, MatcherSpec, RetrySpec, RuleSpec, ThrottleSpec},
    error::{BuildError, ThrottleError},
    jitter::Jitter,
    matcher::{Matcher, PathMatcher, PatternKind},
    middleware::{ThrottleLayer, ThrottleService},
    rate_limit::{FixedWindow, LeakyBucket, MaxConnections, Permit, RateLimiter, TokenBucket},
    retry::RetryLimiter,
    throttle::{Admission, ThrottleEngine, ThrottleRule},
};
