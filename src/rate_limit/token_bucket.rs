//! Classical token bucket with a periodic incremental refill.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BuildError;
use crate::rate_limit::pool::Pool;
use crate::rate_limit::schedule::Replenisher;
use crate::rate_limit::{Permit, RateLimiter};

pub const DEFAULT_BUCKET_SIZE: usize = 1000;
pub const DEFAULT_FILL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_FILL_RATE: usize = 1000;

/// Token bucket holding up to `bucket_size` tokens.
///
/// The bucket starts full. Every `fill_interval` the background schedule adds `fill_rate` tokens,
/// capped at `bucket_size`. Unlike [`FixedWindow`](crate::FixedWindow), unused tokens carry over
/// between ticks, so an idle bucket can absorb a burst of up to `bucket_size` requests.
#[derive(Debug)]
pub struct TokenBucket {
    pool: Arc<Pool>,
    fill_rate: usize,
    schedule: Replenisher,
}

impl TokenBucket {
    /// Must be called from within a tokio runtime.
    pub fn new(bucket_size: usize, fill_rate: usize, fill_interval: Duration) -> Result<Self, BuildError> {
        if fill_rate == 0 {
            return Err(BuildError::invalid_limiter("token_bucket", "fill_rate must be > 0"));
        }
        let pool = Arc::new(Pool::full(bucket_size));
        let filling = pool.clone();
        let schedule = Replenisher::spawn("token_bucket", fill_interval, move || {
            filling.refill(fill_rate);
        })?;
        Ok(Self { pool, fill_rate, schedule })
    }

    /// Take one token, or reject immediately if the bucket is empty.
    pub fn allow_now(&self) -> Permit {
        if self.pool.try_take() {
            Permit::granted()
        } else {
            Permit::denied()
        }
    }

    /// Tokens currently in the bucket.
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    pub fn bucket_size(&self) -> usize {
        self.pool.capacity()
    }

    pub fn fill_rate(&self) -> usize {
        self.fill_rate
    }

    pub fn fill_interval(&self) -> Duration {
        self.schedule.period()
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    fn kind(&self) -> &'static str {
        "token_bucket"
    }

    async fn accept(&self, _cancel: &CancellationToken) -> Permit {
        self.allow_now()
    }
}
