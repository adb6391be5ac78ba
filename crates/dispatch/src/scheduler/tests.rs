use std::sync::{Arc, Barrier, Mutex};

use gatehouse_core::{Config, ErrorCode, QueryFailure, QueryId, SessionContext};
use gatehouse_resource_groups::{GroupSpec, ResourceGroupTree, ResourceGroupsDefinition, SelectorSpec};

use crate::dispatcher::{DispatcherCore, Submission};
use crate::executor::{QueryExecution, QueryExecutor};
use crate::query::QueryState;

/// Executor that only records what it was asked to do.
#[derive(Default)]
struct RecordingExecutor {
    started: Mutex<Vec<QueryId>>,
    aborted: Mutex<Vec<QueryId>>,
}

impl RecordingExecutor {
    fn started(&self) -> Vec<QueryId> {
        self.started.lock().unwrap().clone()
    }
}

impl QueryExecutor for RecordingExecutor {
    fn start(&self, execution: QueryExecution) {
        self.started.lock().unwrap().push(execution.query_id);
    }

    fn abort(&self, query_id: &QueryId) {
        self.aborted.lock().unwrap().push(query_id.clone());
    }
}

/// global(max 3) -> { adhoc(max 2), etl(max 2) }; users `etl_*` go to etl.
fn core_with(executor: Arc<RecordingExecutor>) -> Arc<DispatcherCore> {
    let definition = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("global", 3, 100)
            .with_sub_group(GroupSpec::leaf("adhoc", 2, 50))
            .with_sub_group(GroupSpec::leaf("etl", 2, 50))],
        selectors: vec![
            SelectorSpec {
                user: Some("etl_.*".to_string()),
                ..SelectorSpec::to_group("global.etl")
            },
            SelectorSpec::to_group("global.adhoc"),
        ],
    };
    let tree = Arc::new(ResourceGroupTree::build(&definition).unwrap());
    Arc::new(DispatcherCore::new(Config::default(), tree, executor))
}

fn submit(core: &DispatcherCore, id: &str, user: &str) -> QueryId {
    let query_id: QueryId = id.parse().unwrap();
    core.submit(Submission::new(query_id.clone(), SessionContext::new(user), "SELECT 1"))
        .unwrap();
    query_id
}

fn state(core: &DispatcherCore, id: &QueryId) -> QueryState {
    core.registry.get(id).unwrap().state()
}

#[test]
fn fifo_within_a_group() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    let ids: Vec<_> = (1..=4).map(|n| submit(&core, &format!("q{n}"), "alice")).collect();

    let outcome = core.run_admission_cycle(0);
    assert_eq!(outcome.admitted, 2);
    assert_eq!(executor.started(), ids[..2].to_vec());
    assert_eq!(state(&core, &ids[2]), QueryState::Queued);

    core.report_completion(&ids[0]);
    core.run_admission_cycle(1);
    assert_eq!(executor.started(), ids[..3].to_vec());
}

#[test]
fn root_quota_gates_leaves() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    for n in 1..=3 {
        submit(&core, &format!("a{n}"), "alice");
        submit(&core, &format!("e{n}"), "etl_nightly");
    }

    let outcome = core.run_admission_cycle(0);
    assert_eq!(outcome.admitted, 3);
    let stats = core.registry.stats();
    assert_eq!(stats.running_queries, 3);
    assert_eq!(stats.queued_queries, 3);

    let global = core.groups.roots()[0];
    assert_eq!(core.groups.group(global).unwrap().running_count(), 3);
}

#[test]
fn round_robin_start_rotates() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    for n in 1..=3 {
        submit(&core, &format!("a{n}"), "alice");
        submit(&core, &format!("e{n}"), "etl_nightly");
    }

    // Starting at the second leaf serves etl first.
    core.run_admission_cycle(1);
    let started = executor.started();
    assert_eq!(started[0].as_str(), "e1");
    assert_eq!(started[1].as_str(), "a1");
    assert_eq!(started[2].as_str(), "e2");
}

#[test]
fn failed_while_queued_is_never_admitted() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    let first = submit(&core, "q1", "alice");
    let second = submit(&core, "q2", "alice");

    assert!(core
        .fail(&first, QueryFailure::internal_error("mock exception"))
        .unwrap());
    core.run_admission_cycle(0);

    assert_eq!(state(&core, &first), QueryState::Failed);
    assert_eq!(executor.started(), vec![second]);
    assert!(executor.aborted.lock().unwrap().is_empty());
}

#[test]
fn terminal_release_frees_slot_and_aborts() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    let ids: Vec<_> = (1..=3).map(|n| submit(&core, &format!("q{n}"), "alice")).collect();
    core.run_admission_cycle(0);

    assert!(core.cancel(&ids[0]).unwrap());
    assert!(!core.cancel(&ids[0]).unwrap());
    assert_eq!(*executor.aborted.lock().unwrap(), vec![ids[0].clone()]);

    core.run_admission_cycle(0);
    assert_eq!(state(&core, &ids[2]), QueryState::Running);
    assert_eq!(state(&core, &ids[0]), QueryState::Canceled);
}

#[test]
fn limit_breach_fails_running_query() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    let session = SessionContext::new("alice").with_property("query_max_output_positions", "10");
    let id: QueryId = "q1".parse().unwrap();
    core.submit(Submission::new(id.clone(), session, "SELECT * FROM lineitem"))
        .unwrap();
    core.run_admission_cycle(0);

    core.report_progress(
        &id,
        crate::executor::QueryProgress {
            output_positions: 25,
            ..Default::default()
        },
    );
    assert_eq!(core.enforce_limits(), 1);

    let record = core.registry.get(&id).unwrap();
    let failure = record.outcome().unwrap().failure.clone().unwrap();
    assert_eq!(failure.error_code, ErrorCode::ExceededOutputPositionsLimit);
    assert_eq!(
        core.metrics_snapshot().limit_failures[&ErrorCode::ExceededOutputPositionsLimit],
        1
    );
}

#[test]
fn metrics_track_cycles() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor);
    submit(&core, "q1", "alice");
    core.run_admission_cycle(0);
    core.run_admission_cycle(1);

    let metrics = core.metrics_snapshot();
    assert_eq!(metrics.cycles, 2);
    assert_eq!(metrics.admitted, 1);
}

#[test]
fn round_robin_start_wraps() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    submit(&core, "a1", "alice");
    submit(&core, "e1", "etl_nightly");

    // usize::MAX % 2 == 1, so etl is served first.
    let outcome = core.run_admission_cycle(usize::MAX);
    assert_eq!(outcome.admitted, 2);
    assert_eq!(executor.started()[0].as_str(), "e1");
}

#[test]
fn query_ended_after_admission_is_not_started() {
    let executor = Arc::new(RecordingExecutor::default());
    let core = core_with(executor.clone());
    let id = submit(&core, "q1", "alice");
    core.run_admission_cycle(0);
    assert_eq!(executor.started(), vec![id.clone()]);

    let record = core.registry.get(&id).unwrap();
    assert!(core.cancel(&id).unwrap());
    assert!(!core.start_execution(&record));
    assert_eq!(executor.started(), vec![id]);
}

#[test]
fn limit_breach_races_external_fail() {
    for round in 0..50 {
        let core = core_with(Arc::new(RecordingExecutor::default()));
        let session = SessionContext::new("alice").with_property("query_max_output_positions", "10");
        let id: QueryId = format!("q{round}").parse().unwrap();
        core.submit(Submission::new(id.clone(), session, "SELECT 1")).unwrap();
        core.run_admission_cycle(0);
        core.report_progress(
            &id,
            crate::executor::QueryProgress {
                output_positions: 25,
                ..Default::default()
            },
        );

        let barrier = Barrier::new(2);
        let (breached, failed) = std::thread::scope(|s| {
            let monitor = s.spawn(|| {
                barrier.wait();
                core.enforce_limits()
            });
            let external = s.spawn(|| {
                barrier.wait();
                core.fail(&id, QueryFailure::user_error("killed by operator")).unwrap()
            });
            (monitor.join().unwrap(), external.join().unwrap())
        });
        assert_eq!(breached + usize::from(failed), 1);

        let record = core.registry.get(&id).unwrap();
        let failure = record.outcome().unwrap().failure.clone().unwrap();
        let expected = if failed {
            ErrorCode::GenericUserError
        } else {
            ErrorCode::ExceededOutputPositionsLimit
        };
        assert_eq!(failure.error_code, expected);
        assert_eq!(core.groups.group(core.groups.roots()[0]).unwrap().running_count(), 0);
    }
}
