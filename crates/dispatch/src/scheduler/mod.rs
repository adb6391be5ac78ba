//! Admission scheduler: promotes queued queries when quota allows.
//!
//! Split into focused submodules:
//! - `admission`: one admission cycle over the leaf groups
//! - `metrics`: counters recorded per cycle and per limit failure
//!
//! The loop runs on `admission.interval` and is woken early whenever a query
//! is submitted or a running slot is released.

mod admission;
mod metrics;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::dispatcher::DispatcherCore;

pub use admission::CycleOutcome;
pub use metrics::AdmissionMetrics;

/// Spawn the admission loop. Stops when `shutdown` flips to true or its
/// sender is dropped.
pub(crate) fn spawn(core: Arc<DispatcherCore>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(core.config.admission.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = core.config.admission.interval.as_millis() as u64,
            leaf_groups = core.groups.leaves().len(),
            "admission scheduler started"
        );

        let mut start = 0usize;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = core.wakeup.notified() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }
            core.run_admission_cycle(start);
            start = (start + 1) % core.groups.leaves().len().max(1);
        }

        info!("admission scheduler stopped");
    })
}
