use std::sync::Arc;

use gatehouse_core::{QueryId, SessionContext};
use gatehouse_resource_groups::ResourceGroupError;
use tracing::{info, warn};

use crate::error::{DispatchError, Result};
use crate::query::{NewQuery, QueryRecord};

use super::DispatcherCore;

/// One query submission as received from a client.
#[derive(Debug, Clone)]
pub struct Submission {
    pub query_id: QueryId,
    pub slug: String,
    pub retry_count: u32,
    pub session: SessionContext,
    pub query_text: String,
}

impl Submission {
    pub fn new(query_id: QueryId, session: SessionContext, query_text: impl Into<String>) -> Self {
        Self {
            query_id,
            slug: String::new(),
            retry_count: 0,
            session,
            query_text: query_text.into(),
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

impl DispatcherCore {
    /// Register a query as QUEUED in its resource group.
    ///
    /// Every rejection happens before the record becomes visible, so a failed
    /// submission leaves nothing behind.
    pub(crate) fn submit(&self, submission: Submission) -> Result<()> {
        let Submission {
            query_id,
            slug,
            retry_count,
            session,
            query_text,
        } = submission;

        if self.registry.contains(&query_id) {
            return Err(DispatchError::DuplicateQuery(query_id));
        }

        let group = self.groups.resolve_group(&session).inspect_err(|e| {
            warn!(query_id = %query_id, user = %session.user, error = %e, "query rejected");
        })?;
        let limits = self
            .config
            .query
            .limits
            .with_session_overrides(&session.properties)
            .map_err(DispatchError::InvalidSessionProperty)?;
        let group_path = self
            .groups
            .group(group)
            .map(|g| g.path().clone())
            .ok_or_else(|| ResourceGroupError::UnknownGroup(group.to_string()))?;

        let record = Arc::new(QueryRecord::new(NewQuery {
            id: query_id.clone(),
            slug,
            retry_count,
            session,
            query_text,
            group,
            group_path: group_path.clone(),
            limits,
        }));

        {
            let mut chain = self.groups.lock_chain(group)?;
            chain.enqueue(query_id.clone()).inspect_err(|e| {
                warn!(query_id = %query_id, group = %group_path, error = %e, "query rejected");
            })?;
            // A concurrent submit may have taken the id since the check above.
            if let Err(e) = self.registry.insert(record) {
                chain.remove_queued(&query_id);
                return Err(e);
            }
        }

        info!(query_id = %query_id, group = %group_path, "query queued");
        self.wakeup.notify_one();
        Ok(())
    }
}
