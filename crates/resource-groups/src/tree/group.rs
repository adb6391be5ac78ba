use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gatehouse_core::QueryId;
use serde::Serialize;

use crate::config::{GroupPath, SchedulingPolicy};

use super::GroupId;

/// One node of the quota tree. Limits are immutable; live counters sit
/// behind the node's own mutex.
#[derive(Debug)]
pub struct ResourceGroup {
    pub(crate) id: GroupId,
    pub(crate) path: GroupPath,
    pub(crate) parent: Option<GroupId>,
    pub(crate) children: Vec<GroupId>,
    pub(crate) max_running: usize,
    pub(crate) max_queued: usize,
    pub(crate) policy: SchedulingPolicy,
    state: Mutex<GroupState>,
}

/// Live counters. `running`/`queued` are aggregates over the whole subtree;
/// only leaves hold the queries themselves.
#[derive(Debug, Default)]
pub(crate) struct GroupState {
    pub(crate) running: usize,
    pub(crate) queued: usize,
    pub(crate) queue: VecDeque<QueryId>,
    pub(crate) running_queries: HashSet<QueryId>,
}

impl ResourceGroup {
    pub(crate) fn new(
        id: GroupId,
        path: GroupPath,
        parent: Option<GroupId>,
        max_running: usize,
        max_queued: usize,
        policy: SchedulingPolicy,
    ) -> Self {
        Self {
            id,
            path,
            parent,
            children: Vec::new(),
            max_running,
            max_queued,
            policy,
            state: Mutex::new(GroupState::default()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, GroupState> {
        // Counters only change as a unit inside one critical section.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn path(&self) -> &GroupPath {
        &self.path
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn max_running(&self) -> usize {
        self.max_running
    }

    pub fn max_queued(&self) -> usize {
        self.max_queued
    }

    pub fn scheduling_policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn running_count(&self) -> usize {
        self.lock().running
    }

    pub fn queued_count(&self) -> usize {
        self.lock().queued
    }
}

/// Point-in-time view of a group and its subtree.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceGroupInfo {
    pub path: GroupPath,
    pub max_running: usize,
    pub max_queued: usize,
    pub scheduling_policy: SchedulingPolicy,
    pub running: usize,
    pub queued: usize,
    pub sub_groups: Vec<ResourceGroupInfo>,
}
