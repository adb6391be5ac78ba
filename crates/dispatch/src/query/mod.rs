//! Query records, lifecycle states and their snapshots.

mod info;
mod record;
mod state;

pub use info::{BasicQueryInfo, QueryInfo};
pub(crate) use record::NewQuery;
pub use record::{QueryRecord, TerminalOutcome};
pub use state::QueryState;
