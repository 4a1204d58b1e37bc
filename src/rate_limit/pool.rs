use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded permit inventory.
///
/// Every mutation is one atomic read-modify-write on `available`, so concurrent takers, resets
/// and refills never observe a half-applied update. `available` stays within `[0, capacity]`.
#[derive(Debug)]
pub(crate) struct Pool {
    available: AtomicUsize,
    capacity: usize,
}

impl Pool {
    /// A pool pre-loaded to capacity.
    pub(crate) fn full(capacity: usize) -> Self {
        Self { available: AtomicUsize::new(capacity), capacity }
    }

    /// Claim one permit if any is left.
    pub(crate) fn try_take(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Hard reset to capacity, discarding whatever was left.
    pub(crate) fn reset(&self) {
        self.available.store(self.capacity, Ordering::Release);
    }

    /// Add `amount` permits, capped at capacity. Returns the new level.
    pub(crate) fn refill(&self, amount: usize) -> usize {
        let capacity = self.capacity;
        let previous = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(amount).min(capacity))
            })
            .unwrap_or(capacity);
        previous.saturating_add(amount).min(capacity)
    }

    pub(crate) fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }
}
