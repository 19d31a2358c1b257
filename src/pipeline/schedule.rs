//! Periodic trigger for the run coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::pipeline::coordinator::{RunCoordinator, RunOutcome};

/// Invoke `run_once` now and then every `period` until a stop is requested.
///
/// Each tick spawns its own run, so a tick that lands while the previous run
/// is still going is rejected by the coordinator instead of queuing up.
pub async fn run_every(coordinator: Arc<RunCoordinator>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!("Scheduling runs every {}s", period.as_secs());

    loop {
        ticker.tick().await;
        if coordinator.stop_requested() {
            log::info!("Stop requested, scheduler exiting");
            break;
        }

        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            match coordinator.run_once().await {
                Ok(RunOutcome::Completed(report)) if report.cancelled => {
                    log::warn!("Scheduled run cancelled")
                }
                Ok(_) => {}
                Err(e) => log::error!("Scheduled run failed: {e}"),
            }
        });
    }
}
