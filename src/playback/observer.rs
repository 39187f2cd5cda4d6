// Time observer
// Periodically samples engine position while a playback run is active

use parking_lot::Mutex;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::controller::Core;

/// What the observer should do after a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    Stop,
}

/// Sampling task for one playback run
///
/// Dropping the observer aborts the task. Samples carry the run number they
/// were started for, so a tick that already queued on the core lock when the
/// run ended is discarded there.
pub(crate) struct TimeObserver {
    run: u64,
    task: JoinHandle<()>,
}

impl TimeObserver {
    pub(crate) fn spawn(
        runtime: &Handle,
        core: Weak<Mutex<Core>>,
        run: u64,
        interval: Duration,
    ) -> Self {
        tracing::debug!("[Observer] Starting run {} every {:?}", run, interval);

        let task = runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(core) = core.upgrade() else {
                    break;
                };
                let outcome = core.lock().sample(run);
                if outcome == TickOutcome::Stop {
                    break;
                }
            }

            tracing::debug!("[Observer] Run {} finished", run);
        });

        Self { run, task }
    }

    pub(crate) fn cancel(self) {
        tracing::debug!("[Observer] Cancelling run {}", self.run);
        // Drop aborts
    }
}

impl Drop for TimeObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
