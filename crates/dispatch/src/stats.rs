//! System-wide query counts.

use serde::Serialize;

use crate::query::QueryState;
use crate::registry::QueryRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryManagerStats {
    pub queued_queries: usize,
    pub running_queries: usize,
}

impl QueryRegistry {
    /// Count QUEUED and RUNNING entries as of now. Not cached.
    pub fn stats(&self) -> QueryManagerStats {
        self.snapshot()
            .iter()
            .fold(QueryManagerStats::default(), |mut stats, record| {
                match record.state() {
                    QueryState::Queued => stats.queued_queries += 1,
                    QueryState::Running => stats.running_queries += 1,
                    _ => {}
                }
                stats
            })
    }
}
