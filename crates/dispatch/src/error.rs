//! Errors surfaced by the dispatcher's management API.

use gatehouse_core::{ConfigError, ErrorCode, QueryFailure, QueryId};
use gatehouse_resource_groups::ResourceGroupError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("query {0} already exists")]
    DuplicateQuery(QueryId),

    #[error("query {0} not found")]
    NotFound(QueryId),

    /// Session carried a limit override that does not parse.
    #[error("invalid session property: {0}")]
    InvalidSessionProperty(#[source] ConfigError),

    #[error(transparent)]
    ResourceGroup(#[from] ResourceGroupError),
}

impl DispatchError {
    /// Stable code reported to the submitting client.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DispatchError::DuplicateQuery(_)
            | DispatchError::NotFound(_)
            | DispatchError::InvalidSessionProperty(_) => ErrorCode::GenericUserError,
            DispatchError::ResourceGroup(ResourceGroupError::NoMatchingSelector { .. }) => {
                ErrorCode::GenericUserError
            }
            DispatchError::ResourceGroup(ResourceGroupError::QueueFull { .. }) => {
                ErrorCode::QueryQueueFull
            }
            DispatchError::ResourceGroup(_) => ErrorCode::GenericInternalError,
        }
    }

    pub fn to_failure(&self) -> QueryFailure {
        QueryFailure::new(self.error_code(), self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_errors_map_to_codes() {
        let id: QueryId = "q1".parse().unwrap();
        assert_eq!(
            DispatchError::DuplicateQuery(id.clone()).error_code(),
            ErrorCode::GenericUserError
        );
        let no_match = DispatchError::from(ResourceGroupError::NoMatchingSelector {
            user: "bob".to_string(),
        });
        assert_eq!(no_match.error_code(), ErrorCode::GenericUserError);
        let full = DispatchError::from(ResourceGroupError::QueueFull {
            group: "global".to_string(),
        });
        assert_eq!(full.error_code(), ErrorCode::QueryQueueFull);
        assert_eq!(
            DispatchError::from(ResourceGroupError::NotConfigured).error_code(),
            ErrorCode::GenericInternalError
        );
    }

    #[test]
    fn failure_carries_message() {
        let id: QueryId = "q1".parse().unwrap();
        let failure = DispatchError::NotFound(id).to_failure();
        assert_eq!(failure.error_code, ErrorCode::GenericUserError);
        assert!(failure.message.contains("q1"));
    }
}
