//! In-process executor that fabricates runtime counters.
//!
//! Used by the integration tests and the `gatehouse-sim` binary in place of
//! a real execution engine.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use gatehouse_core::{QueryFailure, QueryId};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::executor::{QueryExecution, QueryExecutor, QueryProgress};

/// Shape of every simulated query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationProfile {
    /// Time between progress reports.
    pub step: Duration,
    /// Steps before the query completes. `None` runs until it is terminated.
    pub steps: Option<u64>,
    /// Counters added per step.
    pub per_step: QueryProgress,
    /// Report this error instead of completing.
    pub fail_with: Option<QueryFailure>,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(10),
            steps: None,
            per_step: QueryProgress {
                cpu_time: Duration::from_millis(1),
                raw_input_bytes: 1024,
                output_positions: 1,
                output_bytes: 64,
            },
            fail_with: None,
        }
    }
}

impl SimulationProfile {
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_per_step(mut self, per_step: QueryProgress) -> Self {
        self.per_step = per_step;
        self
    }

    pub fn failing_with(mut self, failure: QueryFailure) -> Self {
        self.fail_with = Some(failure);
        self
    }
}

#[derive(Debug, Default)]
pub struct SimulatedExecutor {
    profile: SimulationProfile,
    started: Mutex<Vec<QueryId>>,
    aborted: Mutex<HashSet<QueryId>>,
}

impl SimulatedExecutor {
    pub fn new(profile: SimulationProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    /// Queries started so far, in admission order.
    pub fn started(&self) -> Vec<QueryId> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn was_aborted(&self, query_id: &QueryId) -> bool {
        self.aborted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(query_id)
    }
}

impl QueryExecutor for SimulatedExecutor {
    fn start(&self, execution: QueryExecution) {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(execution.query_id.clone());

        let profile = self.profile.clone();
        let reporter = execution.reporter;
        tokio::spawn(async move {
            let mut ticker = interval(profile.step);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut total = QueryProgress::default();
            let mut step = 0u64;

            loop {
                ticker.tick().await;
                if reporter.is_done() {
                    debug!(query_id = %reporter.query_id(), steps = step, "simulation stopped");
                    return;
                }
                if profile.steps.is_some_and(|steps| step >= steps) {
                    break;
                }
                step += 1;
                total.cpu_time += profile.per_step.cpu_time;
                total.raw_input_bytes += profile.per_step.raw_input_bytes;
                total.output_positions += profile.per_step.output_positions;
                total.output_bytes += profile.per_step.output_bytes;
                reporter.report_progress(total);
            }

            match profile.fail_with {
                Some(failure) => reporter.report_execution_error(failure),
                None => reporter.report_completion(),
            }
        });
    }

    fn abort(&self, query_id: &QueryId) {
        self.aborted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(query_id.clone());
    }
}
