use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a query.
///
/// Variant order carries no meaning. Progress comparisons go through
/// [`QueryState::phase_rank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl QueryState {
    /// Lifecycle phase: 0 waiting, 1 executing, 2 terminal. Terminal states
    /// share a rank and are not ordered among themselves.
    pub const fn phase_rank(self) -> u8 {
        match self {
            QueryState::Queued => 0,
            QueryState::Running => 1,
            QueryState::Finished | QueryState::Failed | QueryState::Canceled => 2,
        }
    }

    /// Membership in the terminal set.
    pub const fn is_done(self) -> bool {
        matches!(
            self,
            QueryState::Finished | QueryState::Failed | QueryState::Canceled
        )
    }

    /// Whether this state is at or past the phase of `other`.
    pub const fn has_reached(self, other: QueryState) -> bool {
        self.phase_rank() >= other.phase_rank()
    }

    pub const fn can_transition_to(self, next: QueryState) -> bool {
        matches!(
            (self, next),
            (QueryState::Queued, QueryState::Running)
                | (QueryState::Queued, QueryState::Failed)
                | (QueryState::Queued, QueryState::Canceled)
                | (QueryState::Running, QueryState::Finished)
                | (QueryState::Running, QueryState::Failed)
                | (QueryState::Running, QueryState::Canceled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Finished => "FINISHED",
            QueryState::Failed => "FAILED",
            QueryState::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [QueryState; 5] = [
        QueryState::Queued,
        QueryState::Running,
        QueryState::Finished,
        QueryState::Failed,
        QueryState::Canceled,
    ];

    #[test]
    fn done_is_terminal_membership() {
        let done: Vec<_> = ALL.iter().filter(|s| s.is_done()).collect();
        assert_eq!(
            done,
            vec![&QueryState::Finished, &QueryState::Failed, &QueryState::Canceled]
        );
    }

    #[test]
    fn terminal_states_share_a_rank() {
        assert!(QueryState::Failed.has_reached(QueryState::Finished));
        assert!(QueryState::Finished.has_reached(QueryState::Canceled));
        assert!(QueryState::Running.has_reached(QueryState::Queued));
        assert!(!QueryState::Queued.has_reached(QueryState::Running));
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for from in ALL.iter().filter(|s| s.is_done()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn finished_only_from_running() {
        assert!(!QueryState::Queued.can_transition_to(QueryState::Finished));
        assert!(QueryState::Running.can_transition_to(QueryState::Finished));
        assert!(!QueryState::Running.can_transition_to(QueryState::Queued));
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(serde_json::to_string(&QueryState::Canceled).unwrap(), "\"CANCELED\"");
    }
}
