//! Pluggable configuration providers.
//!
//! A provider turns a property map into a [`ResourceGroupsDefinition`].
//! Providers are registered by name on the [`ResourceGroupManager`] before
//! one of them is selected to load the tree.

mod file;
mod manager;
mod static_provider;

use std::collections::HashMap;

use crate::config::ResourceGroupsDefinition;
use crate::error::Result;

pub use file::{FileConfigurationProvider, CONFIG_FILE_PROPERTY};
pub use manager::ResourceGroupManager;
pub use static_provider::StaticConfigurationProvider;

/// Source of a resource-group definition.
pub trait ConfigurationProvider: Send + Sync {
    /// Registration name, e.g. `file`.
    fn name(&self) -> &str;

    /// Produce a definition from the provider's properties.
    fn load(&self, properties: &HashMap<String, String>) -> Result<ResourceGroupsDefinition>;
}
