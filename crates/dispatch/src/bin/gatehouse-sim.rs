//! gatehouse-sim: drive the dispatcher with simulated queries.
//!
//! Loads system config from the environment (`.env` honoured), loads the
//! resource-group tree through the configured provider (or a single
//! `global` group when none is configured), submits a batch of simulated
//! queries and logs admission progress until every query has ended.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use gatehouse_core::config::load_dotenv;
use gatehouse_core::{Config, SessionContext};
use gatehouse_dispatch::{Dispatcher, SimulatedExecutor, SimulationProfile, Submission};
use gatehouse_resource_groups::{
    GroupSpec, ResourceGroupManager, ResourceGroupsDefinition, SelectorSpec,
    StaticConfigurationProvider,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Submit simulated queries and report admission behaviour.
#[derive(Parser, Debug)]
#[command(name = "gatehouse-sim", version, about)]
struct Cli {
    /// Number of queries to submit.
    #[arg(long, env = "SIM_QUERIES", default_value_t = 10)]
    queries: usize,

    /// Session user for every query (drives selector matching).
    #[arg(long, env = "SIM_USER", default_value = "sim")]
    user: String,

    /// Progress reports per query before it completes.
    #[arg(long, env = "SIM_STEPS", default_value_t = 20)]
    steps: u64,

    /// Milliseconds between progress reports.
    #[arg(long, env = "SIM_STEP_MS", default_value_t = 25)]
    step_ms: u64,

    /// Running slots of the fallback `global` group.
    #[arg(long, env = "SIM_MAX_RUNNING", default_value_t = 3)]
    max_running: usize,

    /// Session limit overrides, e.g. `query_max_cpu_time=5ms`.
    #[arg(long = "session", value_parser = parse_key_value)]
    session: Vec<(String, String)>,

    /// Milliseconds between stats log lines.
    #[arg(long, default_value_t = 200)]
    report_ms: u64,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

fn resource_groups(config: &Config, max_running: usize) -> anyhow::Result<ResourceGroupManager> {
    if config.resource_groups.is_configured() {
        return ResourceGroupManager::from_config(&config.resource_groups)
            .context("failed to load resource groups");
    }

    let manager = ResourceGroupManager::with_default_providers();
    let definition = ResourceGroupsDefinition {
        root_groups: vec![GroupSpec::leaf("global", max_running, 1000)],
        selectors: vec![SelectorSpec::to_group("global")],
    };
    manager.add_provider(Arc::new(StaticConfigurationProvider::new(definition)));
    manager
        .set_configuration_provider("static", &HashMap::new())
        .context("failed to load fallback resource group")?;
    Ok(manager)
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    config.log_summary();

    let manager = resource_groups(&config, cli.max_running)?;
    let profile = SimulationProfile::default()
        .with_steps(cli.steps)
        .with_step(Duration::from_millis(cli.step_ms));
    let executor = Arc::new(SimulatedExecutor::new(profile));
    let dispatcher = Dispatcher::from_manager(config, &manager, executor)?;
    dispatcher.start();

    let mut session = SessionContext::new(cli.user.as_str()).with_source("gatehouse-sim");
    for (key, value) in &cli.session {
        session = session.with_property(key, value);
    }

    for n in 0..cli.queries {
        let query_id = dispatcher.create_query_id();
        let submission =
            Submission::new(query_id.clone(), session.clone(), format!("SELECT {n}"));
        dispatcher
            .submit(submission)
            .await
            .with_context(|| format!("submission of {query_id} failed"))?;
    }
    info!(queries = cli.queries, "submitted");

    let mut ticker = tokio::time::interval(Duration::from_millis(cli.report_ms));
    loop {
        ticker.tick().await;
        let stats = dispatcher.get_stats();
        info!(
            queued = stats.queued_queries,
            running = stats.running_queries,
            "progress"
        );
        if stats.queued_queries == 0 && stats.running_queries == 0 {
            break;
        }
    }

    dispatcher.shutdown().await;

    let mut outcomes: HashMap<String, usize> = HashMap::new();
    for query in dispatcher.list_queries() {
        let key = match query.error_code {
            Some(code) => format!("{} ({code})", query.state),
            None => query.state.to_string(),
        };
        *outcomes.entry(key).or_default() += 1;
    }
    for (outcome, count) in &outcomes {
        info!("  {outcome}: {count}");
    }
    info!(
        metrics = %serde_json::to_string(&dispatcher.admission_metrics())?,
        "admission metrics"
    );
    Ok(())
}
