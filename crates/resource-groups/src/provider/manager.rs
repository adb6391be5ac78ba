use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use gatehouse_core::config::ResourceGroupsConfig;
use tracing::{info, warn};

use crate::error::{ResourceGroupError, Result};
use crate::tree::ResourceGroupTree;

use super::{ConfigurationProvider, FileConfigurationProvider};

/// Registry of configuration providers plus the tree loaded from one of them.
///
/// The tree is loaded exactly once; a second `set_configuration_provider`
/// is rejected so group ids held by live queries never go stale.
pub struct ResourceGroupManager {
    providers: RwLock<HashMap<String, Arc<dyn ConfigurationProvider>>>,
    tree: OnceLock<Arc<ResourceGroupTree>>,
}

impl ResourceGroupManager {
    /// Create a manager with no providers registered.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            tree: OnceLock::new(),
        }
    }

    /// Create a manager with the built-in `file` provider registered.
    pub fn with_default_providers() -> Self {
        let manager = Self::new();
        manager.add_provider(Arc::new(FileConfigurationProvider));
        manager
    }

    /// Build a manager from system config, loading the tree when a provider
    /// is named. Load failures are returned to the caller (fatal at startup).
    pub fn from_config(config: &ResourceGroupsConfig) -> Result<Self> {
        let manager = Self::with_default_providers();
        if let Some(provider) = &config.provider {
            manager.set_configuration_provider(provider, &config.properties)?;
        }
        Ok(manager)
    }

    /// Register a provider under its own name, replacing any previous one.
    pub fn add_provider(&self, provider: Arc<dyn ConfigurationProvider>) {
        let name = provider.name().to_string();
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        if providers.insert(name.clone(), provider).is_some() {
            warn!(provider = %name, "replaced resource group configuration provider");
        } else {
            info!(provider = %name, "registered resource group configuration provider");
        }
    }

    /// Load the tree through the named provider.
    pub fn set_configuration_provider(
        &self,
        name: &str,
        properties: &HashMap<String, String>,
    ) -> Result<Arc<ResourceGroupTree>> {
        if self.tree.get().is_some() {
            return Err(ResourceGroupError::AlreadyConfigured);
        }

        let provider = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceGroupError::UnknownProvider(name.to_string()))?;

        let definition = provider.load(properties)?;
        let tree = Arc::new(ResourceGroupTree::build(&definition)?);

        self.tree
            .set(Arc::clone(&tree))
            .map_err(|_| ResourceGroupError::AlreadyConfigured)?;
        info!(provider = %name, "resource group configuration loaded");
        Ok(tree)
    }

    /// The loaded tree.
    pub fn tree(&self) -> Result<Arc<ResourceGroupTree>> {
        self.tree.get().cloned().ok_or(ResourceGroupError::NotConfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.tree.get().is_some()
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for ResourceGroupManager {
    fn default() -> Self {
        Self::with_default_providers()
    }
}
