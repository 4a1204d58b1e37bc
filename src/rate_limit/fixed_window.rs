//! Window-aligned quota limiter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BuildError;
use crate::rate_limit::pool::Pool;
use crate::rate_limit::schedule::Replenisher;
use crate::rate_limit::{Permit, RateLimiter};

/// Window length used when `window_size_ms` is not configured.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);
/// Admissions per window used when `limit` is not configured.
pub const DEFAULT_LIMIT: usize = 1000;

/// Grants at most `limit` admissions per window.
///
/// The quota starts full. Once per window the background schedule resets it to exactly `limit`,
/// whatever was left unused. Admission never waits.
#[derive(Debug)]
pub struct FixedWindow {
    pool: Arc<Pool>,
    schedule: Replenisher,
}

impl FixedWindow {
    /// Must be called from within a tokio runtime.
    pub fn new(limit: usize, window: Duration) -> Result<Self, BuildError> {
        let pool = Arc::new(Pool::full(limit));
        let resetting = pool.clone();
        let schedule = Replenisher::spawn("fixed_window", window, move || resetting.reset())?;
        Ok(Self { pool, schedule })
    }

    /// Claim one admission from the current window, or reject immediately.
    pub fn allow_now(&self) -> Permit {
        if self.pool.try_take() {
            Permit::granted()
        } else {
            Permit::denied()
        }
    }

    /// Admissions left in the current window.
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    pub fn limit(&self) -> usize {
        self.pool.capacity()
    }

    pub fn window(&self) -> Duration {
        self.schedule.period()
    }
}

#[async_trait]
impl RateLimiter for FixedWindow {
    fn kind(&self) -> &'static str {
        "fixed_window"
    }

    async fn accept(&self, _cancel: &CancellationToken) -> Permit {
        self.allow_now()
    }
}
