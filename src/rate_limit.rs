//! Admission-control primitives.
//!
//! This module provides the building blocks for throttling:
//! - [`RateLimiter`]: the uniform admission capability every algorithm implements.
//! - [`Permit`]: the outcome of an admission attempt, released when the protected work ends.
//! - Four algorithms: [`MaxConnections`], [`FixedWindow`], [`TokenBucket`], [`LeakyBucket`].
//!
//! # Architecture
//!
//! - **Inventory**: the three immediate limiters account admissions in a bounded counter that is
//!   only ever mutated through single atomic read-modify-write operations, so a check-then-take
//!   can never over-admit under race.
//! - **Replenishment**: the time-driven limiters own exactly one background task that refills,
//!   resets, or drains on a fixed period. The task stops when the limiter is dropped.
//! - **Queueing**: the leaky bucket keeps a bounded FIFO of parked callers, each with its own
//!   wake-up channel, drained at a fixed rate.
//!
//! Limiters never return errors at request time; a rejection is an ungranted [`Permit`].

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod fixed_window;
pub mod leaky_bucket;
pub mod max_connections;
mod permit;
mod pool;
mod schedule;
pub mod token_bucket;

pub use fixed_window::FixedWindow;
pub use leaky_bucket::LeakyBucket;
pub use max_connections::MaxConnections;
pub use permit::Permit;
pub use token_bucket::TokenBucket;

/// Core admission capability shared by all algorithms and the retry decorator.
///
/// `accept` resolves to a [`Permit`]; it never fails. Immediate limiters answer without
/// suspending. Queueing limiters may park the caller until capacity frees up or `cancel` fires,
/// in which case the permit is ungranted.
#[async_trait]
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Short algorithm name, used in logs.
    fn kind(&self) -> &'static str;

    /// Attempt to obtain a permit for one request.
    async fn accept(&self, cancel: &CancellationToken) -> Permit;
}
