//! Queueing limiter that drains parked callers at a constant rate.
//!
//! Callers park in a bounded FIFO. Every `leak_interval` the schedule wakes up to `leak_rate` of
//! them, oldest first. A full queue rejects on arrival. A caller whose cancellation token fires,
//! or whose admission future is dropped, leaves the queue so its slot is free for the next one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::BuildError;
use crate::rate_limit::schedule::Replenisher;
use crate::rate_limit::{Permit, RateLimiter};

pub const DEFAULT_BUCKET_SIZE: usize = 1000;
pub const DEFAULT_LEAK_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_LEAK_RATE: usize = 200;

#[derive(Debug)]
struct Waiter {
    id: u64,
    wake: oneshot::Sender<()>,
}

#[derive(Debug)]
struct WaitQueue {
    waiters: Mutex<VecDeque<Waiter>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl WaitQueue {
    fn new(capacity: usize) -> Self {
        Self { waiters: Mutex::new(VecDeque::new()), next_id: AtomicU64::new(0), capacity }
    }

    // Entries are pushed and removed whole, so a poisoned queue is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self) -> Option<(u64, oneshot::Receiver<()>)> {
        let mut waiters = self.lock();
        if waiters.len() >= self.capacity {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (wake, woken) = oneshot::channel();
        waiters.push_back(Waiter { id, wake });
        Some((id, woken))
    }

    fn remove(&self, id: u64) -> bool {
        let mut waiters = self.lock();
        match waiters.iter().position(|w| w.id == id) {
            Some(pos) => {
                waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Wake up to `rate` waiters in FIFO order; returns how many were woken.
    fn leak(&self, rate: usize) -> usize {
        let mut waiters = self.lock();
        let mut released = 0;
        while released < rate {
            let Some(waiter) = waiters.pop_front() else { break };
            // a closed receiver means the caller is gone; it does not count against the rate
            if waiter.wake.send(()).is_ok() {
                released += 1;
            }
        }
        released
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes the caller's entry if it is still queued when the wait ends for any reason.
struct QueuedSlot<'a> {
    queue: &'a WaitQueue,
    id: u64,
}

impl Drop for QueuedSlot<'_> {
    fn drop(&mut self) {
        self.queue.remove(self.id);
    }
}

/// Leaky bucket with a queue of `bucket_size` parked callers, drained `leak_rate` per
/// `leak_interval`.
#[derive(Debug)]
pub struct LeakyBucket {
    queue: Arc<WaitQueue>,
    leak_rate: usize,
    schedule: Replenisher,
}

impl LeakyBucket {
    /// Must be called from within a tokio runtime.
    pub fn new(bucket_size: usize, leak_rate: usize, leak_interval: Duration) -> Result<Self, BuildError> {
        if leak_rate == 0 {
            return Err(BuildError::invalid_limiter("leaky_bucket", "leak_rate must be > 0"));
        }
        let queue = Arc::new(WaitQueue::new(bucket_size));
        let draining = queue.clone();
        let schedule = Replenisher::spawn("leaky_bucket", leak_interval, move || {
            let released = draining.leak(leak_rate);
            if released > 0 {
                tracing::trace!(released, "leaky bucket released waiters");
            }
        })?;
        Ok(Self { queue, leak_rate, schedule })
    }

    /// Park until a leak tick grants admission.
    ///
    /// Rejects immediately when the queue already holds `bucket_size` callers. If `cancel` fires
    /// while parked the caller leaves the queue and the permit is ungranted, even if a tick raced
    /// with the cancellation.
    pub async fn wait_now(&self, cancel: &CancellationToken) -> Permit {
        if cancel.is_cancelled() {
            return Permit::denied();
        }
        let Some((id, woken)) = self.queue.enqueue() else {
            tracing::trace!(bucket_size = self.queue.capacity, "leaky bucket overflow");
            return Permit::denied();
        };
        let _slot = QueuedSlot { queue: &self.queue, id };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::trace!("leaky bucket wait cancelled");
                Permit::denied()
            }
            woke = woken => match woke {
                Ok(()) => Permit::granted(),
                Err(_) => Permit::denied(),
            },
        }
    }

    /// Callers currently parked.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn bucket_size(&self) -> usize {
        self.queue.capacity
    }

    pub fn leak_rate(&self) -> usize {
        self.leak_rate
    }

    pub fn leak_interval(&self) -> Duration {
        self.schedule.period()
    }
}

#[async_trait]
impl RateLimiter for LeakyBucket {
    fn kind(&self) -> &'static str {
        "leaky_bucket"
    }

    async fn accept(&self, cancel: &CancellationToken) -> Permit {
        self.wait_now(cancel).await
    }
}
