//! In-memory provider wrapping a pre-built definition.

use std::collections::HashMap;

use crate::config::ResourceGroupsDefinition;
use crate::error::Result;

use super::ConfigurationProvider;

#[derive(Debug, Clone)]
pub struct StaticConfigurationProvider {
    definition: ResourceGroupsDefinition,
}

impl StaticConfigurationProvider {
    pub fn new(definition: ResourceGroupsDefinition) -> Self {
        Self { definition }
    }
}

impl ConfigurationProvider for StaticConfigurationProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn load(&self, _properties: &HashMap<String, String>) -> Result<ResourceGroupsDefinition> {
        self.definition.validate()?;
        Ok(self.definition.clone())
    }
}
