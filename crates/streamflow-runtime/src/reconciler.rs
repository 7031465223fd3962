//! Periodic registry/backend reconciliation.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use streamflow_core::StreamSupervisor;

/// Run [`StreamSupervisor::reconcile`] every `period` until `cancel` fires.
///
/// The first pass happens immediately, which adopts jobs left running by a
/// previous process.
pub fn spawn_reconciler(
    supervisor: StreamSupervisor,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = supervisor.reconcile().await;
                    debug!(?report, "Reconciliation pass finished");
                }
            }
        }
        debug!("Reconciler stopped");
    })
}
