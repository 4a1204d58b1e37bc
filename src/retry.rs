//! Retry decorator over any [`RateLimiter`].
//!
//! Semantics:
//! - The wrapped limiter is consulted once; a grant is returned immediately.
//! - `max_retry` counts re-attempts after that first rejection (so up to `max_retry + 1`
//!   admission attempts in total). `max_retry == 0` returns the first rejection as-is.
//! - Before re-attempt `n` the caller waits `backoff.delay(n)`; the wait races the caller's
//!   cancellation token and a cancellation ends the loop with a rejection.
//! - Rejected attempts never hold a permit, so nothing is carried between attempts.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use gatewarden::{Backoff, MaxConnections, RateLimiter, RetryLimiter};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let limiter = RetryLimiter::builder(MaxConnections::new(1).unwrap())
//!     .max_retry(3)
//!     .backoff(Backoff::constant(Duration::from_millis(1)))
//!     .build();
//! let permit = limiter.accept(&CancellationToken::new()).await;
//! assert!(permit.is_granted());
//! # });
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backoff::{self, BackoffPolicy};
use crate::rate_limit::{Permit, RateLimiter};
use crate::sleeper::{Sleeper, TokioSleeper};

/// Re-attempts a rejected admission with backoff.
#[derive(Clone)]
pub struct RetryLimiter {
    inner: Arc<dyn RateLimiter>,
    max_retry: usize,
    backoff: Arc<dyn BackoffPolicy>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryLimiter")
            .field("inner", &self.inner)
            .field("max_retry", &self.max_retry)
            .field("backoff", &self.backoff)
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl RetryLimiter {
    /// Start building a decorator around `inner`.
    pub fn builder<L>(inner: L) -> RetryLimiterBuilder
    where
        L: RateLimiter + 'static,
    {
        RetryLimiterBuilder::new(Arc::new(inner))
    }

    /// Start building a decorator around an already shared limiter.
    pub fn builder_shared(inner: Arc<dyn RateLimiter>) -> RetryLimiterBuilder {
        RetryLimiterBuilder::new(inner)
    }

    pub fn max_retry(&self) -> usize {
        self.max_retry
    }

    pub fn inner(&self) -> &Arc<dyn RateLimiter> {
        &self.inner
    }
}

#[async_trait]
impl RateLimiter for RetryLimiter {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    async fn accept(&self, cancel: &CancellationToken) -> Permit {
        let permit = self.inner.accept(cancel).await;
        if permit.is_granted() || self.max_retry == 0 {
            return permit;
        }

        for attempt in 1..=self.max_retry {
            let delay = self.backoff.delay(attempt);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::trace!(attempt, "retry backoff cancelled");
                    return Permit::denied();
                }
                _ = self.sleeper.sleep(delay) => {}
            }

            let permit = self.inner.accept(cancel).await;
            if permit.is_granted() {
                tracing::trace!(attempt, kind = self.inner.kind(), "admitted after retry");
                return permit;
            }
        }

        Permit::denied()
    }
}

/// Builder for [`RetryLimiter`].
pub struct RetryLimiterBuilder {
    inner: Arc<dyn RateLimiter>,
    max_retry: usize,
    backoff: Arc<dyn BackoffPolicy>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryLimiterBuilder {
    /// Defaults: no retries, exponential full-jitter backoff, tokio sleeper.
    pub fn new(inner: Arc<dyn RateLimiter>) -> Self {
        Self {
            inner,
            max_retry: 0,
            backoff: Arc::new(backoff::default_policy()),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Re-attempts after the first rejection.
    pub fn max_retry(mut self, max_retry: usize) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Set backoff policy.
    pub fn backoff<B>(mut self, backoff: B) -> Self
    where
        B: BackoffPolicy + 'static,
    {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> RetryLimiter {
        RetryLimiter {
            inner: self.inner,
            max_retry: self.max_retry,
            backoff: self.backoff,
            sleeper: self.sleeper,
        }
    }
}
