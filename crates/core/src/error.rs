use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad category of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    UserError,
    InternalError,
    InsufficientResources,
}

/// Stable error codes surfaced on terminal FAILED queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GenericUserError,
    GenericInternalError,
    ExceededCpuLimit,
    ExceededOutputSizeLimit,
    ExceededOutputPositionsLimit,
    ExceededScanRawBytesReadLimit,
    ExceededTimeLimit,
    QueryQueueFull,
}

impl ErrorCode {
    /// Wire name, e.g. `EXCEEDED_CPU_LIMIT`.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::GenericUserError => "GENERIC_USER_ERROR",
            ErrorCode::GenericInternalError => "GENERIC_INTERNAL_ERROR",
            ErrorCode::ExceededCpuLimit => "EXCEEDED_CPU_LIMIT",
            ErrorCode::ExceededOutputSizeLimit => "EXCEEDED_OUTPUT_SIZE_LIMIT",
            ErrorCode::ExceededOutputPositionsLimit => "EXCEEDED_OUTPUT_POSITIONS_LIMIT",
            ErrorCode::ExceededScanRawBytesReadLimit => "EXCEEDED_SCAN_RAW_BYTES_READ_LIMIT",
            ErrorCode::ExceededTimeLimit => "EXCEEDED_TIME_LIMIT",
            ErrorCode::QueryQueueFull => "QUERY_QUEUE_FULL",
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            ErrorCode::GenericUserError => ErrorType::UserError,
            ErrorCode::GenericInternalError => ErrorType::InternalError,
            ErrorCode::ExceededCpuLimit
            | ErrorCode::ExceededOutputSizeLimit
            | ErrorCode::ExceededOutputPositionsLimit
            | ErrorCode::ExceededScanRawBytesReadLimit
            | ErrorCode::ExceededTimeLimit
            | ErrorCode::QueryQueueFull => ErrorType::InsufficientResources,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cause recorded on a query that reached FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error_code}: {message}")]
pub struct QueryFailure {
    pub error_code: ErrorCode,
    pub message: String,
}

impl QueryFailure {
    pub fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
        }
    }

    pub fn user_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GenericUserError, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::GenericInternalError, message)
    }
}

/// Errors raised while reading system or session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for property '{key}': {reason}")]
    InvalidProperty {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
