use std::time::Duration;

use chrono::{DateTime, Utc};
use gatehouse_core::{ErrorCode, QueryFailure, QueryId, QueryLimits, SessionContext};
use gatehouse_resource_groups::GroupPath;
use serde::Serialize;

use crate::executor::QueryProgress;

use super::record::QueryRecord;
use super::state::QueryState;

/// Lightweight point-in-time view used by listings.
#[derive(Debug, Clone, Serialize)]
pub struct BasicQueryInfo {
    pub query_id: QueryId,
    pub state: QueryState,
    pub resource_group: GroupPath,
    pub user: String,
    pub source: Option<String>,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error_code: Option<ErrorCode>,
}

/// Detailed view including limits, counters and failure detail.
#[derive(Debug, Clone, Serialize)]
pub struct QueryInfo {
    #[serde(flatten)]
    pub basic: BasicQueryInfo,
    pub retry_count: u32,
    pub session: SessionContext,
    pub limits: QueryLimits,
    pub failure: Option<QueryFailure>,
    pub progress: QueryProgress,
    pub execution_time: Option<Duration>,
}

impl QueryInfo {
    pub fn query_id(&self) -> &QueryId {
        &self.basic.query_id
    }

    pub fn state(&self) -> QueryState {
        self.basic.state
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.basic.error_code
    }
}

impl From<&QueryRecord> for BasicQueryInfo {
    fn from(record: &QueryRecord) -> Self {
        // Outcome first: a terminal record never reports a stale phase.
        let outcome = record.outcome().cloned();
        let state = outcome.as_ref().map(|o| o.state).unwrap_or_else(|| record.state());
        Self {
            query_id: record.id.clone(),
            state,
            resource_group: record.group_path.clone(),
            user: record.session.user.clone(),
            source: record.session.source.clone(),
            query: record.query_text.clone(),
            created_at: record.created_at,
            started_at: record.started_at(),
            ended_at: outcome.as_ref().map(|o| o.ended_at),
            error_code: outcome
                .as_ref()
                .and_then(|o| o.failure.as_ref())
                .map(|f| f.error_code),
        }
    }
}

impl From<&QueryRecord> for QueryInfo {
    fn from(record: &QueryRecord) -> Self {
        let basic = BasicQueryInfo::from(record);
        let failure = record.outcome().and_then(|o| o.failure.clone());
        Self {
            basic,
            retry_count: record.retry_count,
            session: record.session.clone(),
            limits: record.limits.clone(),
            failure,
            progress: record.progress(),
            execution_time: record.execution_time(),
        }
    }
}
