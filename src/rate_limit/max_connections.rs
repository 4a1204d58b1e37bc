//! Concurrency-slot limiter.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::BuildError;
use crate::rate_limit::{Permit, RateLimiter};

/// Slot count used when `max_conns` is not configured.
pub const DEFAULT_MAX_CONNS: usize = 128;

/// Bounds the number of in-flight requests at `max_conns`.
///
/// There is no time dimension: a slot is held from grant until the permit is released, which may
/// happen on a different task than the one that acquired it. Clones share the same slots.
#[derive(Debug, Clone)]
pub struct MaxConnections {
    semaphore: Arc<Semaphore>,
    max_conns: usize,
}

impl MaxConnections {
    pub fn new(max_conns: usize) -> Result<Self, BuildError> {
        if max_conns > Semaphore::MAX_PERMITS {
            return Err(BuildError::invalid_limiter(
                "max_connections",
                format!("max_conns must be <= {} (got {})", Semaphore::MAX_PERMITS, max_conns),
            ));
        }
        Ok(Self { semaphore: Arc::new(Semaphore::new(max_conns)), max_conns })
    }

    /// Claim a slot without waiting.
    pub fn allow_now(&self) -> Permit {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(slot) => Permit::from_slot(slot),
            Err(_) => Permit::denied(),
        }
    }

    /// Slots currently held by unreleased permits.
    pub fn in_flight(&self) -> usize {
        self.max_conns.saturating_sub(self.semaphore.available_permits())
    }

    pub fn max_conns(&self) -> usize {
        self.max_conns
    }
}

impl Default for MaxConnections {
    fn default() -> Self {
        Self { semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONNS)), max_conns: DEFAULT_MAX_CONNS }
    }
}

#[async_trait]
impl RateLimiter for MaxConnections {
    fn kind(&self) -> &'static str {
        "max_connections"
    }

    async fn accept(&self, _cancel: &CancellationToken) -> Permit {
        self.allow_now()
    }
}
