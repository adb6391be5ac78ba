//! Execution monitor: limit enforcement and history retention.
//!
//! Every `query.limit-check-interval` the monitor samples each RUNNING
//! query's counters against its frozen limits and fails the query on the
//! first breach. A query that ends for another reason between the sample and
//! the fail is left alone; the first terminal transition wins.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::dispatcher::DispatcherCore;
use crate::query::QueryState;

impl DispatcherCore {
    /// Fail every running query that exceeds one of its limits. Returns the
    /// number of queries this pass failed.
    pub(crate) fn enforce_limits(&self) -> usize {
        let mut failed = 0;
        for record in self.registry.running() {
            let Some(failure) = record.first_breach() else {
                continue;
            };
            let code = failure.error_code;
            match self.terminate(&record, QueryState::Failed, Some(failure)) {
                Ok(true) => {
                    failed += 1;
                    self.with_metrics(|m| m.record_limit_failure(code));
                    warn!(query_id = %record.id, error_code = %code, "query exceeded limit");
                }
                Ok(false) => {}
                Err(e) => warn!(query_id = %record.id, error = %e, "limit enforcement failed"),
            }
        }
        failed
    }

    /// Evict expired terminal queries beyond the configured history size.
    pub(crate) fn prune_history(&self) -> usize {
        let evicted = self.registry.evict_expired(
            self.config.query.max_history,
            self.config.query.min_expire_age,
            Utc::now(),
        );
        if !evicted.is_empty() {
            self.with_metrics(|m| m.record_evictions(evicted.len()));
        }
        evicted.len()
    }
}

pub(crate) fn spawn(core: Arc<DispatcherCore>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = core.config.admission.limit_check_interval;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = period.as_millis() as u64, "execution monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }
            core.enforce_limits();
            core.prune_history();
        }

        info!("execution monitor stopped");
    })
}
