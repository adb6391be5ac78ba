//! Hierarchical quota tree.
//!
//! Groups live in an arena addressed by [`GroupId`] (stable for the lifetime
//! of the tree) and by [`GroupPath`]. Queries only ever queue in leaf groups;
//! admission is gated by the leaf and every ancestor through [`GroupChain`].

mod chain;
mod group;


use std::collections::HashMap;

use gatehouse_core::{QueryId, SessionContext};
use tracing::debug;

use crate::config::{GroupPath, GroupSpec, ResourceGroupsDefinition};
use crate::error::{ResourceGroupError, Result};
use crate::selector::CompiledSelector;

pub use chain::GroupChain;
pub use group::{ResourceGroup, ResourceGroupInfo};

/// Index of a group in its tree.
pub type GroupId = usize;

#[derive(Debug)]
pub struct ResourceGroupTree {
    groups: Vec<ResourceGroup>,
    by_path: HashMap<GroupPath, GroupId>,
    roots: Vec<GroupId>,
    leaves: Vec<GroupId>,
    selectors: Vec<CompiledSelector>,
}

impl ResourceGroupTree {
    /// Validate a definition and build the tree from it.
    pub fn build(definition: &ResourceGroupsDefinition) -> Result<Self> {
        definition.validate()?;

        let mut tree = Self {
            groups: Vec::new(),
            by_path: HashMap::new(),
            roots: Vec::new(),
            leaves: Vec::new(),
            selectors: Vec::new(),
        };
        for spec in &definition.root_groups {
            let id = tree.add_group(spec, GroupPath::root(&spec.name), None);
            tree.roots.push(id);
        }

        for selector in &definition.selectors {
            let path: GroupPath = selector.group.parse()?;
            let group = tree
                .find(&path)
                .ok_or_else(|| ResourceGroupError::UnknownGroup(selector.group.clone()))?;
            tree.selectors.push(CompiledSelector::compile(selector, group)?);
        }

        debug!(
            groups = tree.groups.len(),
            leaves = tree.leaves.len(),
            selectors = tree.selectors.len(),
            "built resource group tree"
        );
        Ok(tree)
    }

    fn add_group(&mut self, spec: &GroupSpec, path: GroupPath, parent: Option<GroupId>) -> GroupId {
        let id = self.groups.len();
        self.groups.push(ResourceGroup::new(
            id,
            path.clone(),
            parent,
            spec.hard_concurrency_limit.unwrap_or(0),
            spec.max_queued.unwrap_or(0),
            spec.scheduling_policy,
        ));
        self.by_path.insert(path.clone(), id);

        if spec.sub_groups.is_empty() {
            self.leaves.push(id);
        }
        for child in &spec.sub_groups {
            let child_id = self.add_group(child, path.child(&child.name), Some(id));
            self.groups[id].children.push(child_id);
        }
        id
    }

    /// First selector matching the session wins.
    pub fn resolve_group(&self, session: &SessionContext) -> Result<GroupId> {
        self.selectors
            .iter()
            .find(|selector| selector.matches(session))
            .map(|selector| selector.group)
            .ok_or_else(|| ResourceGroupError::NoMatchingSelector {
                user: session.user.clone(),
            })
    }

    pub fn group(&self, id: GroupId) -> Option<&ResourceGroup> {
        self.groups.get(id)
    }

    pub fn find(&self, path: &GroupPath) -> Option<GroupId> {
        self.by_path.get(path).copied()
    }

    pub fn roots(&self) -> &[GroupId] {
        &self.roots
    }

    /// Leaf groups in definition order.
    pub fn leaves(&self) -> &[GroupId] {
        &self.leaves
    }

    /// Lock `group` and all of its ancestors, root first.
    pub fn lock_chain(&self, group: GroupId) -> Result<GroupChain<'_>> {
        let leaf = self
            .groups
            .get(group)
            .ok_or_else(|| ResourceGroupError::UnknownGroup(group.to_string()))?;

        let mut ancestors = Vec::new();
        let mut cursor = leaf.parent;
        while let Some(id) = cursor {
            let node = &self.groups[id];
            ancestors.push(node);
            cursor = node.parent;
        }
        ancestors.reverse();
        Ok(GroupChain::lock(ancestors, leaf))
    }

    /// Atomic check-and-increment of the running count on `group` and every
    /// ancestor. Succeeds only if all of them have a free slot.
    pub fn try_admit(&self, group: GroupId, query_id: QueryId) -> Result<bool> {
        Ok(self.lock_chain(group)?.try_admit(query_id))
    }

    /// Atomic decrement of the running count on `group` and every ancestor.
    pub fn release(&self, group: GroupId, query_id: &QueryId) -> Result<bool> {
        Ok(self.lock_chain(group)?.release(query_id))
    }

    /// Snapshot of one group and its subtree. Locks one node at a time.
    pub fn info(&self, id: GroupId) -> Option<ResourceGroupInfo> {
        let group = self.groups.get(id)?;
        let (running, queued) = {
            let state = group.lock();
            (state.running, state.queued)
        };
        Some(ResourceGroupInfo {
            path: group.path.clone(),
            max_running: group.max_running,
            max_queued: group.max_queued,
            scheduling_policy: group.policy,
            running,
            queued,
            sub_groups: group.children.iter().filter_map(|c| self.info(*c)).collect(),
        })
    }

    pub fn root_infos(&self) -> Vec<ResourceGroupInfo> {
        self.roots.iter().filter_map(|id| self.info(*id)).collect()
    }
}
