use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A periodic background task that stops when cancelled or dropped.
pub(crate) struct CleanupTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl CleanupTask {
    /// Spawn a task that calls `f` once every `period`, starting one period
    /// from now.
    ///
    /// A zero `period` is raised to one millisecond.
    pub(crate) fn new<F, Fut>(period: Duration, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => f().await,
                    }
                }
            }
        });
        Self { cancel, handle }
    }

    /// Stops the task. A tick that is already running finishes first.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
