use std::sync::{Arc, Weak};
use std::time::Duration;

use exam_core::timer::TICK_MS;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::attempts::coordinator::AttemptCoordinator;
use crate::attempts::phase::TickOutcome;

/// Recurring timer driving [`AttemptCoordinator::on_tick`].
///
/// The task exits on its own once the clock stops or expires, or once the
/// coordinator is dropped. Dropping the ticker cancels it.
#[derive(Debug)]
pub struct SessionTicker {
    handle: JoinHandle<()>,
}

impl SessionTicker {
    /// Tick `coordinator` once per clock quantum. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn spawn(coordinator: &Arc<Mutex<AttemptCoordinator>>) -> Self {
        Self::spawn_with_period(coordinator, Duration::from_millis(TICK_MS))
    }

    #[must_use]
    pub fn spawn_with_period(
        coordinator: &Arc<Mutex<AttemptCoordinator>>,
        period: Duration,
    ) -> Self {
        let coordinator = Arc::downgrade(coordinator);
        let handle = tokio::spawn(run(coordinator, period));
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(coordinator: Weak<Mutex<AttemptCoordinator>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        let outcome = coordinator.lock().await.on_tick().await;
        match outcome {
            TickOutcome::Idle | TickOutcome::Ticked { .. } => {}
            TickOutcome::Stopped => break,
            TickOutcome::Expired(Ok(status)) => {
                tracing::info!(?status, "attempt finished on expiry");
                break;
            }
            TickOutcome::Expired(Err(err)) => {
                tracing::warn!(error = %err, "forced finish failed; waiting for a manual retry");
                break;
            }
        }
    }
    tracing::trace!("session ticker stopped");
}
