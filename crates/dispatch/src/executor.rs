//! Boundary to the execution engine.
//!
//! After admission the dispatcher hands each query to a [`QueryExecutor`].
//! The engine reports back through the [`ExecutionReporter`] it receives with
//! the query; reports for queries that already ended are dropped.

use std::sync::Weak;
use std::time::Duration;

use gatehouse_core::{QueryFailure, QueryId, SessionContext};
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatcherCore;

/// Cumulative runtime counters of one query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryProgress {
    pub cpu_time: Duration,
    pub raw_input_bytes: u64,
    pub output_positions: u64,
    pub output_bytes: u64,
}

/// Execution engine driven by the dispatcher.
pub trait QueryExecutor: Send + Sync + 'static {
    /// Begin executing an admitted query. Called outside every dispatcher
    /// lock; must not block.
    fn start(&self, execution: QueryExecution);

    /// Stop work for a query that was canceled or failed while running.
    ///
    /// A query that ends right after admission can see `abort` before
    /// `start`; `start` must check [`ExecutionReporter::is_done`] before doing
    /// any work.
    fn abort(&self, _query_id: &QueryId) {}
}

/// An admitted query handed to the executor.
#[derive(Debug)]
pub struct QueryExecution {
    pub query_id: QueryId,
    pub query_text: String,
    pub session: SessionContext,
    pub reporter: ExecutionReporter,
}

/// Report channel from the executor back to the dispatcher.
#[derive(Debug, Clone)]
pub struct ExecutionReporter {
    query_id: QueryId,
    core: Weak<DispatcherCore>,
}

impl ExecutionReporter {
    pub(crate) fn new(query_id: QueryId, core: Weak<DispatcherCore>) -> Self {
        Self { query_id, core }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.query_id
    }

    pub fn report_progress(&self, progress: QueryProgress) {
        if let Some(core) = self.core.upgrade() {
            core.report_progress(&self.query_id, progress);
        }
    }

    pub fn report_completion(&self) {
        if let Some(core) = self.core.upgrade() {
            core.report_completion(&self.query_id);
        }
    }

    pub fn report_execution_error(&self, cause: QueryFailure) {
        if let Some(core) = self.core.upgrade() {
            core.report_execution_error(&self.query_id, cause);
        }
    }

    /// True once the query is terminal or the dispatcher is gone.
    pub fn is_done(&self) -> bool {
        match self.core.upgrade() {
            Some(core) => core
                .registry
                .get(&self.query_id)
                .map(|record| record.is_done())
                .unwrap_or(true),
            None => true,
        }
    }
}
