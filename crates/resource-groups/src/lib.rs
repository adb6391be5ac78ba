//! Hierarchical resource groups: configuration, selection and quota tree.
//!
//! This crate provides:
//! - serde definition types with fail-fast validation (JSON or YAML)
//! - named, pluggable configuration providers (`file`, `static`)
//! - first-match-wins selectors over session attributes
//! - an arena-backed group tree with hierarchical running/queued quotas

pub mod config;
pub mod error;
pub mod provider;
mod selector;
pub mod tree;

pub use config::{GroupPath, GroupSpec, ResourceGroupsDefinition, SchedulingPolicy, SelectorSpec};
pub use error::{ResourceGroupError, Result};
pub use provider::{
    ConfigurationProvider, FileConfigurationProvider, ResourceGroupManager,
    StaticConfigurationProvider, CONFIG_FILE_PROPERTY,
};
pub use tree::{GroupChain, GroupId, ResourceGroup, ResourceGroupInfo, ResourceGroupTree};
