//! Error types for resource-group configuration and admission.

use std::path::PathBuf;

/// Errors raised while loading, validating or using a resource-group tree.
#[derive(Debug, thiserror::Error)]
pub enum ResourceGroupError {
    /// Configuration file could not be read.
    #[error("failed to read resource group config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse/deserialization error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structurally valid document that violates a tree rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No provider registered under the requested name.
    #[error("resource group configuration provider '{0}' is not registered")]
    UnknownProvider(String),

    /// Provider was asked to load without a property it needs.
    #[error("missing required property '{0}'")]
    MissingProperty(String),

    #[error("resource group configuration has not been loaded")]
    NotConfigured,

    #[error("resource group configuration is already loaded")]
    AlreadyConfigured,

    /// Submission-time: no selector matched the session.
    #[error("query did not match any selection rules (user: {user})")]
    NoMatchingSelector { user: String },

    /// Submission-time: the group or one of its ancestors is at max-queued.
    #[error("too many queued queries for \"{group}\"")]
    QueueFull { group: String },

    #[error("resource group not found: {0}")]
    UnknownGroup(String),
}

/// Result alias for resource-group operations.
pub type Result<T> = std::result::Result<T, ResourceGroupError>;
