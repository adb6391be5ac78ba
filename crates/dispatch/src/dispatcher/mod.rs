//! Management API over the query lifecycle.
//!
//! Split into focused submodules:
//! - `core`: shared state and terminal transitions
//! - `submission`: registration of new queries into their resource group
//!
//! [`Dispatcher`] is the public handle. It owns the background admission
//! scheduler and execution monitor once [`Dispatcher::start`] is called.

mod core;
mod submission;

use std::sync::{Arc, Mutex, PoisonError};

use gatehouse_core::{Config, QueryFailure, QueryId};
use gatehouse_resource_groups::{
    GroupPath, ResourceGroupError, ResourceGroupInfo, ResourceGroupManager, ResourceGroupTree,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{DispatchError, Result};
use crate::executor::{QueryExecutor, QueryProgress};
use crate::query::{BasicQueryInfo, QueryInfo, QueryState};
use crate::scheduler::AdmissionMetrics;
use crate::stats::QueryManagerStats;
use crate::{monitor, scheduler};

pub use self::core::DispatcherCore;
pub use self::submission::Submission;

pub struct Dispatcher {
    core: Arc<DispatcherCore>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        groups: Arc<ResourceGroupTree>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            core: Arc::new(DispatcherCore::new(config, groups, executor)),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build a dispatcher over the tree loaded by `manager`.
    pub fn from_manager(
        config: Config,
        manager: &ResourceGroupManager,
        executor: Arc<dyn QueryExecutor>,
    ) -> Result<Self> {
        Ok(Self::new(config, manager.tree()?, executor))
    }

    /// Spawn the admission scheduler and execution monitor on the current
    /// tokio runtime. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            return;
        }
        self.shutdown.send_replace(false);
        tasks.push(scheduler::spawn(Arc::clone(&self.core), self.shutdown.subscribe()));
        tasks.push(monitor::spawn(Arc::clone(&self.core), self.shutdown.subscribe()));
        info!(
            coordinator_id = %self.core.id_generator.coordinator_id(),
            "dispatcher started"
        );
    }

    /// Stop the background tasks and wait for them to exit. Queries keep
    /// their current state.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        info!("dispatcher stopped");
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn create_query_id(&self) -> QueryId {
        self.core.id_generator.create_next()
    }

    /// Register a query as QUEUED. Completes once the query is accepted for
    /// queueing, not when it starts running.
    pub async fn submit(&self, submission: Submission) -> Result<()> {
        self.core.submit(submission)
    }

    pub fn list_queries(&self) -> Vec<BasicQueryInfo> {
        self.core
            .registry
            .snapshot()
            .iter()
            .map(|record| BasicQueryInfo::from(record.as_ref()))
            .collect()
    }

    pub fn get_query_info(&self, query_id: &QueryId) -> Result<BasicQueryInfo> {
        let record = self.core.registry.require(query_id)?;
        Ok(BasicQueryInfo::from(record.as_ref()))
    }

    pub fn get_full_query_info(&self, query_id: &QueryId) -> Result<QueryInfo> {
        let record = self.core.registry.require(query_id)?;
        Ok(QueryInfo::from(record.as_ref()))
    }

    pub fn get_query_state(&self, query_id: &QueryId) -> Result<QueryState> {
        Ok(self.core.registry.require(query_id)?.state())
    }

    /// Request CANCELED. Returns false if the query had already ended.
    pub fn cancel_query(&self, query_id: &QueryId) -> Result<bool> {
        self.core.cancel(query_id)
    }

    /// Request FAILED with `cause`. Returns false if the query had already
    /// ended; the first recorded cause is kept.
    pub fn fail_query(&self, query_id: &QueryId, cause: QueryFailure) -> Result<bool> {
        self.core.fail(query_id, cause)
    }

    pub fn get_stats(&self) -> QueryManagerStats {
        self.core.registry.stats()
    }

    /// State notifications for one query, starting from its current state.
    pub fn subscribe(&self, query_id: &QueryId) -> Result<watch::Receiver<QueryState>> {
        Ok(self.core.registry.require(query_id)?.subscribe())
    }

    /// Whether `slug` authenticates operations on `query_id`.
    pub fn verify_slug(&self, query_id: &QueryId, slug: &str) -> bool {
        self.core
            .registry
            .get(query_id)
            .map(|record| record.slug == slug)
            .unwrap_or(false)
    }

    pub fn resource_group_info(&self, path: &GroupPath) -> Result<ResourceGroupInfo> {
        self.core
            .groups
            .find(path)
            .and_then(|id| self.core.groups.info(id))
            .ok_or_else(|| DispatchError::from(ResourceGroupError::UnknownGroup(path.to_string())))
    }

    pub fn admission_metrics(&self) -> AdmissionMetrics {
        self.core.metrics_snapshot()
    }

    // ── Executor reports by id ───────────────────────────────────────

    pub fn report_progress(&self, query_id: &QueryId, progress: QueryProgress) {
        self.core.report_progress(query_id, progress);
    }

    pub fn report_completion(&self, query_id: &QueryId) {
        self.core.report_completion(query_id);
    }

    pub fn report_execution_error(&self, query_id: &QueryId, cause: QueryFailure) {
        self.core.report_execution_error(query_id, cause);
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
