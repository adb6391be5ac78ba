use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use gatehouse_core::{LimitKind, QueryFailure, QueryId, QueryLimits, SessionContext};
use gatehouse_resource_groups::{GroupId, GroupPath};
use tokio::sync::watch;

use crate::executor::QueryProgress;

use super::state::QueryState;

const PHASE_QUEUED: u8 = 0;
const PHASE_RUNNING: u8 = 1;

/// Recorded end of a query. Written once.
#[derive(Debug, Clone)]
pub struct TerminalOutcome {
    pub state: QueryState,
    pub failure: Option<QueryFailure>,
    pub ended_at: DateTime<Utc>,
}

/// Registry entry for one query.
///
/// Pre-terminal progress lives in `phase`; the terminal outcome is a one-shot
/// cell, so the first terminal transition to land is the only one. Both are
/// only written while the query's group chain is locked, which makes queue
/// membership, slot accounting and state change a single step.
#[derive(Debug)]
pub struct QueryRecord {
    pub(crate) id: QueryId,
    pub(crate) slug: String,
    pub(crate) retry_count: u32,
    pub(crate) session: SessionContext,
    pub(crate) query_text: String,
    pub(crate) group: GroupId,
    pub(crate) group_path: GroupPath,
    pub(crate) limits: QueryLimits,
    pub(crate) created_at: DateTime<Utc>,
    started: OnceLock<(DateTime<Utc>, Instant)>,
    phase: AtomicU8,
    outcome: OnceLock<TerminalOutcome>,
    cpu_time_nanos: AtomicU64,
    raw_input_bytes: AtomicU64,
    output_positions: AtomicU64,
    output_bytes: AtomicU64,
    state_tx: watch::Sender<QueryState>,
}

pub(crate) struct NewQuery {
    pub id: QueryId,
    pub slug: String,
    pub retry_count: u32,
    pub session: SessionContext,
    pub query_text: String,
    pub group: GroupId,
    pub group_path: GroupPath,
    pub limits: QueryLimits,
}

impl QueryRecord {
    pub(crate) fn new(query: NewQuery) -> Self {
        let (state_tx, _) = watch::channel(QueryState::Queued);
        Self {
            id: query.id,
            slug: query.slug,
            retry_count: query.retry_count,
            session: query.session,
            query_text: query.query_text,
            group: query.group,
            group_path: query.group_path,
            limits: query.limits,
            created_at: Utc::now(),
            started: OnceLock::new(),
            phase: AtomicU8::new(PHASE_QUEUED),
            outcome: OnceLock::new(),
            cpu_time_nanos: AtomicU64::new(0),
            raw_input_bytes: AtomicU64::new(0),
            output_positions: AtomicU64::new(0),
            output_bytes: AtomicU64::new(0),
            state_tx,
        }
    }

    pub fn id(&self) -> &QueryId {
        &self.id
    }

    pub fn state(&self) -> QueryState {
        if let Some(outcome) = self.outcome.get() {
            return outcome.state;
        }
        match self.phase.load(Ordering::Acquire) {
            PHASE_RUNNING => QueryState::Running,
            _ => QueryState::Queued,
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub fn outcome(&self) -> Option<&TerminalOutcome> {
        self.outcome.get()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started.get().map(|(at, _)| *at)
    }

    /// Wall time spent since admission, frozen at the terminal transition.
    pub fn execution_time(&self) -> Option<Duration> {
        let (started_at, started) = self.started.get()?;
        match self.outcome.get() {
            Some(outcome) => Some((outcome.ended_at - *started_at).to_std().unwrap_or_default()),
            None => Some(started.elapsed()),
        }
    }

    /// QUEUED -> RUNNING. Caller holds the group chain lock.
    pub(crate) fn mark_running(&self) -> bool {
        if self.is_done() {
            return false;
        }
        if self
            .phase
            .compare_exchange(PHASE_QUEUED, PHASE_RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _ = self.started.set((Utc::now(), Instant::now()));
        self.state_tx.send_replace(QueryState::Running);
        true
    }

    /// Record the terminal outcome. Returns false when another transition
    /// already won. Caller holds the group chain lock.
    pub(crate) fn finish(&self, state: QueryState, failure: Option<QueryFailure>) -> bool {
        debug_assert!(state.is_done());
        if !self.state().can_transition_to(state) {
            return false;
        }
        let outcome = TerminalOutcome {
            state,
            failure,
            ended_at: Utc::now(),
        };
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        self.state_tx.send_replace(state);
        true
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state_tx.subscribe()
    }

    /// Merge cumulative counters. Counters only move forward.
    pub(crate) fn record_progress(&self, progress: &QueryProgress) {
        let cpu = u64::try_from(progress.cpu_time.as_nanos()).unwrap_or(u64::MAX);
        self.cpu_time_nanos.fetch_max(cpu, Ordering::Relaxed);
        self.raw_input_bytes.fetch_max(progress.raw_input_bytes, Ordering::Relaxed);
        self.output_positions.fetch_max(progress.output_positions, Ordering::Relaxed);
        self.output_bytes.fetch_max(progress.output_bytes, Ordering::Relaxed);
    }

    pub fn progress(&self) -> QueryProgress {
        QueryProgress {
            cpu_time: Duration::from_nanos(self.cpu_time_nanos.load(Ordering::Relaxed)),
            raw_input_bytes: self.raw_input_bytes.load(Ordering::Relaxed),
            output_positions: self.output_positions.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
        }
    }

    /// First exceeded limit in check order, as the failure to record.
    pub(crate) fn first_breach(&self) -> Option<QueryFailure> {
        let progress = self.progress();
        let limits = &self.limits;
        LimitKind::CHECK_ORDER.into_iter().find_map(|kind| {
            let message = match kind {
                LimitKind::CpuTime => exceeded(progress.cpu_time, limits.max_cpu_time)
                    .map(|max| format!("Query exceeded maximum CPU time limit of {max:?}")),
                LimitKind::ScanRawInputBytes => {
                    exceeded(progress.raw_input_bytes, limits.max_scan_raw_input_bytes)
                        .map(|max| format!("Query exceeded maximum raw input bytes limit of {max}B"))
                }
                LimitKind::OutputPositions => {
                    exceeded(progress.output_positions, limits.max_output_positions)
                        .map(|max| format!("Query exceeded maximum output positions limit of {max}"))
                }
                LimitKind::OutputSize => exceeded(progress.output_bytes, limits.max_output_size)
                    .map(|max| format!("Query exceeded maximum output size limit of {max}B")),
                LimitKind::ExecutionTime => {
                    exceeded(self.execution_time()?, limits.max_execution_time)
                        .map(|max| format!("Query exceeded maximum execution time limit of {max:?}"))
                }
            }?;
            Some(QueryFailure::new(kind.error_code(), message))
        })
    }
}

/// `Some(limit)` when `value` is strictly past a configured `limit`.
fn exceeded<T: PartialOrd + Copy>(value: T, limit: Option<T>) -> Option<T> {
    limit.filter(|max| value > *max)
}
