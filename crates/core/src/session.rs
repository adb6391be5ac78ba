use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Originating session of a query submission.
///
/// Resource-group selectors match on `user`, `source` and `client_tags`;
/// `properties` carries session overrides such as `query_max_cpu_time`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user: String,
    pub source: Option<String>,
    #[serde(default)]
    pub client_tags: BTreeSet<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl SessionContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_client_tag(mut self, tag: impl Into<String>) -> Self {
        self.client_tags.insert(tag.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self.schema = Some(schema.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
