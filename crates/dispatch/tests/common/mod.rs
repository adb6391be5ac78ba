use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_core::{Config, QueryId, SessionContext};
use gatehouse_dispatch::{Dispatcher, QueryState, SimulatedExecutor, SimulationProfile, Submission};
use gatehouse_resource_groups::{ResourceGroupManager, CONFIG_FILE_PROPERTY};

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Fast-cycling config with the given extra properties.
pub fn config(properties: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    map.entry("admission.interval".to_string()).or_insert_with(|| "10ms".to_string());
    map.entry("query.limit-check-interval".to_string())
        .or_insert_with(|| "10ms".to_string());
    Config::from_properties(&map).unwrap()
}

pub fn manager() -> ResourceGroupManager {
    let manager = ResourceGroupManager::with_default_providers();
    let properties = HashMap::from([(
        CONFIG_FILE_PROPERTY.to_string(),
        fixture("resource_groups.json").display().to_string(),
    )]);
    manager.set_configuration_provider("file", &properties).unwrap();
    manager
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub executor: Arc<SimulatedExecutor>,
}

/// Started dispatcher over the fixture groups.
pub fn harness(config: Config, profile: SimulationProfile) -> Harness {
    let executor = Arc::new(SimulatedExecutor::new(profile));
    let dispatcher = Dispatcher::from_manager(config, &manager(), executor.clone()).unwrap();
    dispatcher.start();
    Harness {
        dispatcher,
        executor,
    }
}

/// Queries that never finish on their own.
pub fn endless() -> SimulationProfile {
    SimulationProfile::default().with_step(Duration::from_millis(5))
}

pub async fn submit(dispatcher: &Dispatcher, session: SessionContext) -> QueryId {
    let query_id = dispatcher.create_query_id();
    dispatcher
        .submit(Submission::new(query_id.clone(), session, "SELECT * FROM lineitem"))
        .await
        .unwrap();
    query_id
}

/// Wait (bounded) until the query's state satisfies `done`.
pub async fn wait_for_state(
    dispatcher: &Dispatcher,
    query_id: &QueryId,
    done: impl FnMut(&QueryState) -> bool,
) -> QueryState {
    let mut rx = dispatcher.subscribe(query_id).unwrap();
    let state = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(done))
        .await
        .expect("timed out waiting for query state")
        .expect("query state channel closed");
    *state
}
