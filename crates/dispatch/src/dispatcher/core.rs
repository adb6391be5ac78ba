use std::sync::{Arc, PoisonError, RwLock};

use gatehouse_core::{Config, QueryFailure, QueryId, QueryIdGenerator};
use gatehouse_resource_groups::ResourceGroupTree;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::executor::{QueryExecutor, QueryProgress};
use crate::query::{QueryRecord, QueryState};
use crate::registry::QueryRegistry;
use crate::scheduler::AdmissionMetrics;

/// State shared by the public dispatcher handle, the background tasks and
/// every [`ExecutionReporter`](crate::executor::ExecutionReporter).
pub struct DispatcherCore {
    pub(crate) config: Config,
    pub(crate) groups: Arc<ResourceGroupTree>,
    pub(crate) registry: QueryRegistry,
    pub(crate) id_generator: QueryIdGenerator,
    pub(crate) executor: Arc<dyn QueryExecutor>,
    /// Wakes the admission scheduler early (new submission or freed slot).
    pub(crate) wakeup: Notify,
    pub(crate) metrics: RwLock<AdmissionMetrics>,
}

impl std::fmt::Debug for DispatcherCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherCore")
            .field("queries", &self.registry.len())
            .field("coordinator_id", &self.id_generator.coordinator_id())
            .finish_non_exhaustive()
    }
}

impl DispatcherCore {
    pub(crate) fn new(
        config: Config,
        groups: Arc<ResourceGroupTree>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            config,
            groups,
            registry: QueryRegistry::new(),
            id_generator: QueryIdGenerator::new(),
            executor,
            wakeup: Notify::new(),
            metrics: RwLock::new(AdmissionMetrics::default()),
        }
    }

    pub(crate) fn with_metrics<R>(&self, f: impl FnOnce(&mut AdmissionMetrics) -> R) -> R {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut metrics)
    }

    pub(crate) fn metrics_snapshot(&self) -> AdmissionMetrics {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Move a query to a terminal state.
    ///
    /// Runs under the query's group chain lock: the outcome is recorded and
    /// the query leaves its queue or gives back its slot in the same step.
    /// Returns false when the query already ended (or, for FINISHED, was
    /// never running).
    pub(crate) fn terminate(
        &self,
        record: &QueryRecord,
        state: QueryState,
        failure: Option<QueryFailure>,
    ) -> Result<bool> {
        let released = {
            let mut chain = self.groups.lock_chain(record.group)?;
            if !record.finish(state, failure) {
                return Ok(false);
            }
            let released = chain.release(&record.id);
            if !released {
                chain.remove_queued(&record.id);
            }
            released
        };

        if released {
            if state != QueryState::Finished {
                self.executor.abort(&record.id);
            }
            self.wakeup.notify_one();
        }

        let error_code = record
            .outcome()
            .and_then(|o| o.failure.as_ref())
            .map(|f| f.error_code.name());
        info!(
            query_id = %record.id,
            group = %record.group_path,
            state = %state,
            error_code = error_code.unwrap_or("-"),
            "query reached terminal state"
        );
        Ok(true)
    }

    pub(crate) fn fail(&self, query_id: &QueryId, cause: QueryFailure) -> Result<bool> {
        let record = self.registry.require(query_id)?;
        let applied = self.terminate(&record, QueryState::Failed, Some(cause))?;
        if !applied {
            debug!(query_id = %query_id, state = %record.state(), "fail ignored, query already done");
        }
        Ok(applied)
    }

    pub(crate) fn cancel(&self, query_id: &QueryId) -> Result<bool> {
        let record = self.registry.require(query_id)?;
        self.terminate(&record, QueryState::Canceled, None)
    }

    // ── Executor reports ─────────────────────────────────────────────

    pub(crate) fn report_progress(&self, query_id: &QueryId, progress: QueryProgress) {
        match self.registry.get(query_id) {
            Some(record) if !record.is_done() => record.record_progress(&progress),
            Some(_) => {}
            None => debug!(query_id = %query_id, "progress for unknown query"),
        }
    }

    pub(crate) fn report_completion(&self, query_id: &QueryId) {
        let Some(record) = self.registry.get(query_id) else {
            warn!(query_id = %query_id, "completion for unknown query");
            return;
        };
        match self.terminate(&record, QueryState::Finished, None) {
            Ok(true) => {}
            Ok(false) => debug!(
                query_id = %query_id,
                state = %record.state(),
                "completion ignored"
            ),
            Err(e) => warn!(query_id = %query_id, error = %e, "completion failed"),
        }
    }

    /// Executor errors are recorded with the code the executor supplied.
    pub(crate) fn report_execution_error(&self, query_id: &QueryId, cause: QueryFailure) {
        if let Err(e) = self.fail(query_id, cause) {
            warn!(query_id = %query_id, error = %e, "execution error report dropped");
        }
    }
}
