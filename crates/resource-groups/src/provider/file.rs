//! File-backed provider: JSON or YAML document on disk.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::config::ResourceGroupsDefinition;
use crate::error::{ResourceGroupError, Result};

use super::ConfigurationProvider;

/// Property naming the definition file.
pub const CONFIG_FILE_PROPERTY: &str = "resource-groups.config-file";

#[derive(Debug, Default)]
pub struct FileConfigurationProvider;

impl ConfigurationProvider for FileConfigurationProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self, properties: &HashMap<String, String>) -> Result<ResourceGroupsDefinition> {
        let path = properties
            .get(CONFIG_FILE_PROPERTY)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ResourceGroupError::MissingProperty(CONFIG_FILE_PROPERTY.to_string()))?;

        let definition = ResourceGroupsDefinition::from_file(Path::new(path))?;
        info!(
            path = %path,
            root_groups = definition.root_groups.len(),
            selectors = definition.selectors.len(),
            "loaded resource group definition"
        );
        Ok(definition)
    }
}
