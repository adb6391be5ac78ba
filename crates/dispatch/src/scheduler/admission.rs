use std::sync::Arc;
use std::time::Instant;

use gatehouse_resource_groups::GroupId;
use tracing::{debug, warn};

use crate::dispatcher::DispatcherCore;
use crate::executor::{ExecutionReporter, QueryExecution};
use crate::query::QueryRecord;

/// Result of one admission cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub admitted: usize,
    pub discarded: usize,
}

enum Admission {
    Admitted(Arc<QueryRecord>),
    /// Queue empty or quota exhausted somewhere on the chain.
    Idle,
}

impl DispatcherCore {
    /// Serve every leaf group round-robin, starting at `start`.
    ///
    /// Each pass admits at most one query per group; passes repeat until one
    /// admits nothing, so a freed slot is never left idle for a whole cycle.
    pub(crate) fn run_admission_cycle(self: &Arc<Self>, start: usize) -> CycleOutcome {
        let started = Instant::now();
        let leaves = self.groups.leaves();
        let mut outcome = CycleOutcome::default();
        if leaves.is_empty() {
            return outcome;
        }
        let start = start % leaves.len();

        loop {
            let mut admitted_this_pass = 0;
            for offset in 0..leaves.len() {
                let group = leaves[(start + offset) % leaves.len()];
                match self.admit_next(group, &mut outcome.discarded) {
                    Admission::Admitted(record) => {
                        admitted_this_pass += 1;
                        self.start_execution(&record);
                    }
                    Admission::Idle => {}
                }
            }
            outcome.admitted += admitted_this_pass;
            if admitted_this_pass == 0 {
                break;
            }
        }

        if outcome.admitted > 0 || outcome.discarded > 0 {
            debug!(
                admitted = outcome.admitted,
                discarded = outcome.discarded,
                "admission cycle"
            );
        }
        self.with_metrics(|m| {
            m.record_cycle(started.elapsed(), outcome.admitted, outcome.discarded)
        });
        outcome
    }

    /// Admit the oldest pending query of `group` if every group on its chain
    /// has a free slot. Dequeue, slot increment and the RUNNING transition
    /// happen under one chain lock.
    fn admit_next(&self, group: GroupId, discarded: &mut usize) -> Admission {
        let mut chain = match self.groups.lock_chain(group) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(group, error = %e, "cannot lock resource group");
                return Admission::Idle;
            }
        };

        loop {
            let Some(query_id) = chain.peek_queued().cloned() else {
                return Admission::Idle;
            };
            let record = match self.registry.get(&query_id) {
                Some(record) if !record.is_done() => record,
                _ => {
                    chain.dequeue();
                    *discarded += 1;
                    continue;
                }
            };

            if !chain.try_admit(query_id.clone()) {
                return Admission::Idle;
            }
            chain.dequeue();
            if !record.mark_running() {
                chain.release(&query_id);
                *discarded += 1;
                continue;
            }
            return Admission::Admitted(record);
        }
    }

    /// Hand an admitted query to the executor. Skipped when the query ended
    /// after the chain lock was dropped; returns whether `start` was called.
    pub(super) fn start_execution(self: &Arc<Self>, record: &Arc<QueryRecord>) -> bool {
        if record.is_done() {
            debug!(query_id = %record.id, state = %record.state(), "query ended before start");
            return false;
        }
        debug!(query_id = %record.id, group = %record.group_path, "query admitted");
        self.executor.start(QueryExecution {
            query_id: record.id.clone(),
            query_text: record.query_text.clone(),
            session: record.session.clone(),
            reporter: ExecutionReporter::new(record.id.clone(), Arc::downgrade(self)),
        });
        true
    }
}
