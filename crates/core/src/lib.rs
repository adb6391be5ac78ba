pub mod config;
pub mod error;
pub mod limits;
pub mod query_id;
pub mod session;
pub mod units;

pub use config::Config;
pub use error::*;
pub use limits::{LimitKind, QueryLimits};
pub use query_id::{InvalidQueryId, QueryId, QueryIdGenerator};
pub use session::SessionContext;
