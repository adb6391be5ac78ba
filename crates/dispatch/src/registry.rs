//! Process-lifetime map from query id to record.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use gatehouse_core::QueryId;
use tracing::debug;

use crate::error::{DispatchError, Result};
use crate::query::{QueryRecord, QueryState};

/// Owns every query record. The map lock is only held for lookups and
/// membership changes, never across a state transition.
#[derive(Debug, Default)]
pub struct QueryRegistry {
    queries: RwLock<HashMap<QueryId, Arc<QueryRecord>>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryId, Arc<QueryRecord>>> {
        self.queries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryId, Arc<QueryRecord>>> {
        self.queries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new record; fails if the id is already registered.
    pub(crate) fn insert(&self, record: Arc<QueryRecord>) -> Result<()> {
        let mut queries = self.write();
        if queries.contains_key(record.id()) {
            return Err(DispatchError::DuplicateQuery(record.id().clone()));
        }
        queries.insert(record.id().clone(), record);
        Ok(())
    }

    pub fn contains(&self, query_id: &QueryId) -> bool {
        self.read().contains_key(query_id)
    }

    pub fn get(&self, query_id: &QueryId) -> Option<Arc<QueryRecord>> {
        self.read().get(query_id).cloned()
    }

    pub(crate) fn require(&self, query_id: &QueryId) -> Result<Arc<QueryRecord>> {
        self.get(query_id)
            .ok_or_else(|| DispatchError::NotFound(query_id.clone()))
    }

    /// Point-in-time copy of all entries.
    pub fn snapshot(&self) -> Vec<Arc<QueryRecord>> {
        self.read().values().cloned().collect()
    }

    pub fn running(&self) -> Vec<Arc<QueryRecord>> {
        self.read()
            .values()
            .filter(|record| record.state() == QueryState::Running)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop terminal records older than `min_expire_age`, oldest first, while
    /// more than `max_history` terminal records remain. Returns evicted ids.
    pub fn evict_expired(
        &self,
        max_history: usize,
        min_expire_age: Duration,
        now: DateTime<Utc>,
    ) -> Vec<QueryId> {
        let mut queries = self.write();
        let mut terminal: Vec<(DateTime<Utc>, QueryId)> = queries
            .values()
            .filter_map(|record| record.outcome().map(|o| (o.ended_at, record.id().clone())))
            .collect();
        if terminal.len() <= max_history {
            return Vec::new();
        }
        terminal.sort();

        let excess = terminal.len() - max_history;
        let evicted: Vec<QueryId> = terminal
            .into_iter()
            .take(excess)
            .take_while(|(ended_at, _)| {
                (now - *ended_at).to_std().map(|age| age >= min_expire_age).unwrap_or(false)
            })
            .map(|(_, id)| id)
            .collect();

        for id in &evicted {
            queries.remove(id);
        }
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), remaining = queries.len(), "evicted expired queries");
        }
        evicted
    }
}
