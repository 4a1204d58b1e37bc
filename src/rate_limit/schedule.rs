use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::BuildError;

/// Handle to the background task that replenishes one limiter.
///
/// Exactly one task is spawned per handle. It first fires one full `period` after spawn and then
/// every `period`. Dropping the handle stops the task; the task drops its tick closure (and with
/// it any shared state the closure captured) when it exits.
#[derive(Debug)]
pub(crate) struct Replenisher {
    stop: CancellationToken,
    period: Duration,
}

impl Replenisher {
    pub(crate) fn spawn<F>(kind: &'static str, period: Duration, mut tick: F) -> Result<Self, BuildError>
    where
        F: FnMut() + Send + 'static,
    {
        if period.is_zero() {
            return Err(BuildError::invalid_limiter(kind, "tick period must be > 0"));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let stop = CancellationToken::new();
        let stopped = stop.clone();
        runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::trace!(kind, ?period, "replenishment schedule started");
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.cancelled() => break,
                    _ = interval.tick() => tick(),
                }
            }
            tracing::trace!(kind, "replenishment schedule stopped");
        });

        Ok(Self { stop, period })
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for Replenisher {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
