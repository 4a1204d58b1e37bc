//! The wait between retry attempts.
//!
//! [`RetryLimiter`](crate::RetryLimiter) races the future a sleeper returns against the caller's
//! cancellation token, so implementations only have to wait; they never observe cancellation.
//! Production code uses [`TokioSleeper`], which follows the runtime clock and therefore honors
//! paused time in tests.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Produces a future that completes after roughly `duration`.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Waits on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}
