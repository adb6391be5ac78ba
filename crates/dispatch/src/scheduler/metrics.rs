use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gatehouse_core::ErrorCode;
use serde::Serialize;

/// Admission and enforcement counters exposed for monitoring.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdmissionMetrics {
    /// Admission cycles completed.
    pub cycles: u64,
    /// Queries promoted to RUNNING.
    pub admitted: u64,
    /// Terminal queries dropped from a queue without taking a slot.
    pub discarded: u64,
    /// Queries failed by the execution monitor, by error code.
    pub limit_failures: HashMap<ErrorCode, u64>,
    /// Queries evicted by the retention pass.
    pub evicted: u64,
    /// Average wall time of one admission cycle.
    pub avg_cycle_duration: Duration,
    pub last_cycle: Option<DateTime<Utc>>,
}

impl AdmissionMetrics {
    pub fn record_cycle(&mut self, duration: Duration, admitted: usize, discarded: usize) {
        self.cycles += 1;
        self.admitted += admitted as u64;
        self.discarded += discarded as u64;
        self.last_cycle = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_cycle_duration = if self.cycles == 1 {
            duration
        } else {
            let prev_nanos = self.avg_cycle_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.cycles as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    pub fn record_limit_failure(&mut self, code: ErrorCode) {
        *self.limit_failures.entry(code).or_default() += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evicted += count as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_single_cycle() {
        let mut m = AdmissionMetrics::default();
        m.record_cycle(Duration::from_millis(4), 2, 1);

        assert_eq!(m.cycles, 1);
        assert_eq!(m.admitted, 2);
        assert_eq!(m.discarded, 1);
        assert!(m.last_cycle.is_some());
        assert_eq!(m.avg_cycle_duration, Duration::from_millis(4));
    }

    #[test]
    fn cycle_duration_averages() {
        let mut m = AdmissionMetrics::default();
        m.record_cycle(Duration::from_millis(100), 0, 0);
        m.record_cycle(Duration::from_millis(200), 0, 0);

        let avg = m.avg_cycle_duration.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn limit_failures_by_code() {
        let mut m = AdmissionMetrics::default();
        m.record_limit_failure(ErrorCode::ExceededCpuLimit);
        m.record_limit_failure(ErrorCode::ExceededCpuLimit);
        m.record_limit_failure(ErrorCode::ExceededOutputSizeLimit);
        assert_eq!(m.limit_failures[&ErrorCode::ExceededCpuLimit], 2);
        assert_eq!(m.limit_failures.len(), 2);
    }
}
