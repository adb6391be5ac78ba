//! Per-query resource limits.
//!
//! System defaults come from `query.*` properties; a session may tighten any
//! of them through the matching `query_*` session property. The resolved
//! [`QueryLimits`] is frozen on the query at submission time.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ErrorCode};
use crate::units::{parse_data_size, parse_duration};

/// A single configurable limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitKind {
    CpuTime,
    ScanRawInputBytes,
    OutputPositions,
    OutputSize,
    ExecutionTime,
}

impl LimitKind {
    /// Check order used by the execution monitor. First breach wins.
    pub const CHECK_ORDER: [LimitKind; 5] = [
        LimitKind::CpuTime,
        LimitKind::ScanRawInputBytes,
        LimitKind::OutputPositions,
        LimitKind::OutputSize,
        LimitKind::ExecutionTime,
    ];

    pub fn system_property(&self) -> &'static str {
        match self {
            LimitKind::CpuTime => "query.max-cpu-time",
            LimitKind::ScanRawInputBytes => "query.max-scan-raw-input-bytes",
            LimitKind::OutputPositions => "query.max-output-positions",
            LimitKind::OutputSize => "query.max-output-size",
            LimitKind::ExecutionTime => "query.max-execution-time",
        }
    }

    pub fn session_property(&self) -> &'static str {
        match self {
            LimitKind::CpuTime => "query_max_cpu_time",
            LimitKind::ScanRawInputBytes => "query_max_scan_raw_input_bytes",
            LimitKind::OutputPositions => "query_max_output_positions",
            LimitKind::OutputSize => "query_max_output_size",
            LimitKind::ExecutionTime => "query_max_execution_time",
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            LimitKind::CpuTime => ErrorCode::ExceededCpuLimit,
            LimitKind::ScanRawInputBytes => ErrorCode::ExceededScanRawBytesReadLimit,
            LimitKind::OutputPositions => ErrorCode::ExceededOutputPositionsLimit,
            LimitKind::OutputSize => ErrorCode::ExceededOutputSizeLimit,
            LimitKind::ExecutionTime => ErrorCode::ExceededTimeLimit,
        }
    }
}

/// Resolved limits for one query. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    pub max_cpu_time: Option<Duration>,
    pub max_scan_raw_input_bytes: Option<u64>,
    pub max_output_positions: Option<u64>,
    pub max_output_size: Option<u64>,
    pub max_execution_time: Option<Duration>,
}

impl QueryLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Read system defaults from a `query.*` property map. Unknown keys are ignored.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut limits = Self::unbounded();
        for kind in LimitKind::CHECK_ORDER {
            if let Some(raw) = properties.get(kind.system_property()) {
                limits.set(kind, kind.system_property(), raw)?;
            }
        }
        Ok(limits)
    }

    /// Apply session overrides on top of these defaults.
    ///
    /// A session value can only tighten a limit: when both are set the
    /// smaller one wins.
    pub fn with_session_overrides(
        &self,
        session_properties: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut session = Self::unbounded();
        for kind in LimitKind::CHECK_ORDER {
            if let Some(raw) = session_properties.get(kind.session_property()) {
                session.set(kind, kind.session_property(), raw)?;
            }
        }
        Ok(Self {
            max_cpu_time: tighter(self.max_cpu_time, session.max_cpu_time),
            max_scan_raw_input_bytes: tighter(
                self.max_scan_raw_input_bytes,
                session.max_scan_raw_input_bytes,
            ),
            max_output_positions: tighter(self.max_output_positions, session.max_output_positions),
            max_output_size: tighter(self.max_output_size, session.max_output_size),
            max_execution_time: tighter(self.max_execution_time, session.max_execution_time),
        })
    }

    /// Parse and store a single limit value.
    pub fn set(&mut self, kind: LimitKind, key: &str, raw: &str) -> Result<(), ConfigError> {
        match kind {
            LimitKind::CpuTime => self.max_cpu_time = Some(duration_value(key, raw)?),
            LimitKind::ExecutionTime => self.max_execution_time = Some(duration_value(key, raw)?),
            LimitKind::ScanRawInputBytes => {
                self.max_scan_raw_input_bytes = Some(size_value(key, raw)?)
            }
            LimitKind::OutputSize => self.max_output_size = Some(size_value(key, raw)?),
            LimitKind::OutputPositions => {
                let positions = raw.trim().parse::<u64>().map_err(|_| {
                    ConfigError::invalid(key, raw, "expected a non-negative row count")
                })?;
                self.max_output_positions = Some(positions);
            }
        }
        Ok(())
    }
}

fn tighter<T: Ord>(system: Option<T>, session: Option<T>) -> Option<T> {
    match (system, session) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn duration_value(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    parse_duration(raw).ok_or_else(|| ConfigError::invalid(key, raw, "expected a duration like '30s'"))
}

fn size_value(key: &str, raw: &str) -> Result<u64, ConfigError> {
    parse_data_size(raw).ok_or_else(|| ConfigError::invalid(key, raw, "expected a data size like '10MB'"))
}
