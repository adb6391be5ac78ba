use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResourceGroupError;

// ── Top-level document ──────────────────────────────────────────────

/// Resource-group definition as loaded by a configuration provider.
///
/// ```json
/// {
///   "rootGroups": [
///     { "name": "global", "hardConcurrencyLimit": 100, "maxQueued": 1000,
///       "subGroups": [ { "name": "adhoc", "hardConcurrencyLimit": 3, "maxQueued": 100 } ] }
///   ],
///   "selectors": [ { "user": "etl_.*", "group": "global.adhoc" } ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupsDefinition {
    /// Top-level groups. Each one roots an independent quota hierarchy.
    pub root_groups: Vec<GroupSpec>,

    /// Ordered selection rules; the first match wins.
    #[serde(default)]
    pub selectors: Vec<SelectorSpec>,
}

// ── Section specs ───────────────────────────────────────────────────

/// One node of the group hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    /// Segment name; must not contain `.`.
    pub name: String,

    /// Maximum concurrently running queries in this subtree.
    #[serde(alias = "maxRunning")]
    pub hard_concurrency_limit: Option<usize>,

    /// Maximum queued queries in this subtree.
    pub max_queued: Option<usize>,

    #[serde(default)]
    pub scheduling_policy: SchedulingPolicy,

    /// Memory-based admission is not supported; validation rejects any value.
    pub soft_memory_limit: Option<String>,

    #[serde(default)]
    pub sub_groups: Vec<GroupSpec>,
}

impl GroupSpec {
    /// Leaf group with the given limits.
    pub fn leaf(name: &str, max_running: usize, max_queued: usize) -> Self {
        Self {
            name: name.to_string(),
            hard_concurrency_limit: Some(max_running),
            max_queued: Some(max_queued),
            scheduling_policy: SchedulingPolicy::Fifo,
            soft_memory_limit: None,
            sub_groups: Vec::new(),
        }
    }

    pub fn with_sub_group(mut self, group: GroupSpec) -> Self {
        self.sub_groups.push(group);
        self
    }
}

/// Order in which queued queries of a leaf are admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingPolicy {
    #[default]
    Fifo,
}

/// Selection rule: session predicates and the target group path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSpec {
    /// Regex the session user must fully match.
    pub user: Option<String>,

    /// Regex the session source must fully match.
    pub source: Option<String>,

    /// Tags that must all be present on the session.
    #[serde(default)]
    pub client_tags: Vec<String>,

    /// Dotted path of the target leaf group, e.g. `global.adhoc`.
    pub group: String,
}

impl SelectorSpec {
    pub fn to_group(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Self::default()
        }
    }
}

// ── Group path ──────────────────────────────────────────────────────

/// Stable name-path key of a group, e.g. `global.adhoc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct GroupPath(Vec<String>);

impl GroupPath {
    pub fn root(name: &str) -> Self {
        Self(vec![name.to_string()])
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl FromStr for GroupPath {
    type Err = ResourceGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(|segment| segment.trim().is_empty()) {
            return Err(ResourceGroupError::Validation(format!(
                "invalid resource group path '{s}'"
            )));
        }
        Ok(Self(segments))
    }
}

impl From<GroupPath> for String {
    fn from(path: GroupPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for GroupPath {
    type Error = ResourceGroupError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
