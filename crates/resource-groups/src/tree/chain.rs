use std::sync::MutexGuard;

use gatehouse_core::QueryId;

use crate::config::GroupPath;
use crate::error::{ResourceGroupError, Result};

use super::group::{GroupState, ResourceGroup};

/// Locks held on a leaf group and every ancestor, acquired root first.
///
/// All counter changes for a query's queue membership happen through this
/// guard, so the per-group `running <= max_running` and
/// `queued <= max_queued` checks and the matching increments are one atomic
/// step with respect to any other chain touching the same groups.
pub struct GroupChain<'a> {
    ancestors: Vec<(&'a ResourceGroup, MutexGuard<'a, GroupState>)>,
    leaf_group: &'a ResourceGroup,
    leaf: MutexGuard<'a, GroupState>,
}

impl<'a> GroupChain<'a> {
    /// `ancestors` must be ordered root first and exclude `leaf`.
    pub(crate) fn lock(ancestors: Vec<&'a ResourceGroup>, leaf_group: &'a ResourceGroup) -> Self {
        let ancestors = ancestors.into_iter().map(|g| (g, g.lock())).collect();
        let leaf = leaf_group.lock();
        Self {
            ancestors,
            leaf_group,
            leaf,
        }
    }

    /// Whether every group on the chain has a free running slot.
    pub fn can_run_more(&self) -> bool {
        self.leaf.running < self.leaf_group.max_running
            && self
                .ancestors
                .iter()
                .all(|(group, state)| state.running < group.max_running)
    }

    /// First group on the chain (root first) whose queue is full.
    fn full_queue(&self) -> Option<&GroupPath> {
        self.ancestors
            .iter()
            .find(|(group, state)| state.queued >= group.max_queued)
            .map(|(group, _)| &group.path)
            .or_else(|| {
                (self.leaf.queued >= self.leaf_group.max_queued).then_some(&self.leaf_group.path)
            })
    }

    /// Append a query to the leaf queue, enforcing max-queued on every group.
    pub fn enqueue(&mut self, query_id: QueryId) -> Result<()> {
        if let Some(path) = self.full_queue() {
            return Err(ResourceGroupError::QueueFull {
                group: path.to_string(),
            });
        }
        self.leaf.queue.push_back(query_id);
        self.adjust_queued(true);
        Ok(())
    }

    /// Oldest queued query, if any.
    pub fn peek_queued(&self) -> Option<&QueryId> {
        self.leaf.queue.front()
    }

    pub fn dequeue(&mut self) -> Option<QueryId> {
        let query_id = self.leaf.queue.pop_front()?;
        self.adjust_queued(false);
        Some(query_id)
    }

    /// Remove a specific query from the leaf queue.
    pub fn remove_queued(&mut self, query_id: &QueryId) -> bool {
        match self.leaf.queue.iter().position(|q| q == query_id) {
            Some(index) => {
                self.leaf.queue.remove(index);
                self.adjust_queued(false);
                true
            }
            None => false,
        }
    }

    /// Check-and-increment: take a running slot on every group of the chain.
    pub fn try_admit(&mut self, query_id: QueryId) -> bool {
        if !self.can_run_more() || self.leaf.running_queries.contains(&query_id) {
            return false;
        }
        self.leaf.running_queries.insert(query_id);
        self.leaf.running += 1;
        for (_, state) in self.ancestors.iter_mut() {
            state.running += 1;
        }
        debug_assert!(self.leaf.running <= self.leaf_group.max_running);
        true
    }

    /// Give back the running slot held by `query_id`. No-op if it holds none.
    pub fn release(&mut self, query_id: &QueryId) -> bool {
        if !self.leaf.running_queries.remove(query_id) {
            return false;
        }
        self.leaf.running -= 1;
        for (_, state) in self.ancestors.iter_mut() {
            state.running -= 1;
        }
        true
    }

    fn adjust_queued(&mut self, increment: bool) {
        let states = self
            .ancestors
            .iter_mut()
            .map(|(_, state)| &mut **state)
            .chain(std::iter::once(&mut *self.leaf));
        for state in states {
            if increment {
                state.queued += 1;
            } else {
                state.queued -= 1;
            }
        }
    }
}
