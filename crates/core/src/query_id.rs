use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque, globally unique query identifier.
///
/// Generated ids look like `20261019_143005_00042_k3x9a`: creation time,
/// a process-wide sequence number and a per-process coordinator suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(String);

#[derive(Debug, Error)]
#[error("invalid query id '{0}': expected lowercase letters, digits and '_'")]
pub struct InvalidQueryId(pub String);

impl QueryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for QueryId {
    type Err = InvalidQueryId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidQueryId(s.to_string()))
        }
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thread-safe issuer of [`QueryId`]s. Sequence numbers are never reused.
#[derive(Debug)]
pub struct QueryIdGenerator {
    coordinator_id: String,
    next: AtomicU64,
}

impl QueryIdGenerator {
    pub fn new() -> Self {
        let coordinator_id: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(5)
            .collect();
        Self::with_coordinator_id(coordinator_id)
    }

    pub fn with_coordinator_id(coordinator_id: impl Into<String>) -> Self {
        Self {
            coordinator_id: coordinator_id.into().to_ascii_lowercase(),
            next: AtomicU64::new(0),
        }
    }

    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    pub fn create_next(&self) -> QueryId {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        QueryId(format!(
            "{}_{:05}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            sequence,
            self.coordinator_id
        ))
    }
}

impl Default for QueryIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn generated_ids_parse_back() {
        let generator = QueryIdGenerator::with_coordinator_id("abcde");
        let id = generator.create_next();
        assert!(id.as_str().ends_with("_00000_abcde"));
        let parsed: QueryId = id.as_str().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("".parse::<QueryId>().is_err());
        assert!("Query-1".parse::<QueryId>().is_err());
        assert!("q 1".parse::<QueryId>().is_err());
    }

    #[test]
    fn concurrent_generation_is_collision_free() {
        let generator = Arc::new(QueryIdGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..250).map(|_| generator.create_next()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate query id issued");
            }
        }
        assert_eq!(seen.len(), 2000);
    }
}
