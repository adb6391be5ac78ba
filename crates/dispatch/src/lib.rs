//! Query admission and lifecycle management.
//!
//! This crate provides:
//! - a [`Dispatcher`] that registers submissions into resource groups
//! - a background admission scheduler enforcing hierarchical quotas
//! - an execution monitor failing queries that exceed their limits
//! - the [`QueryExecutor`] boundary towards the execution engine

pub mod dispatcher;
pub mod error;
pub mod executor;
mod monitor;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod simulator;
pub mod stats;

pub use dispatcher::{Dispatcher, Submission};
pub use error::{DispatchError, Result};
pub use executor::{ExecutionReporter, QueryExecution, QueryExecutor, QueryProgress};
pub use query::{BasicQueryInfo, QueryInfo, QueryState};
pub use registry::QueryRegistry;
pub use scheduler::AdmissionMetrics;
pub use simulator::{SimulatedExecutor, SimulationProfile};
pub use stats::QueryManagerStats;
