use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::limits::{LimitKind, QueryLimits};
use crate::units::parse_duration;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// Env var name -> property key. Env lookups are folded into a property map
/// so both sources go through the same parsing and validation.
const ENV_PROPERTY_KEYS: &[(&str, &str)] = &[
    ("QUERY_MAX_CPU_TIME", "query.max-cpu-time"),
    ("QUERY_MAX_SCAN_RAW_INPUT_BYTES", "query.max-scan-raw-input-bytes"),
    ("QUERY_MAX_OUTPUT_POSITIONS", "query.max-output-positions"),
    ("QUERY_MAX_OUTPUT_SIZE", "query.max-output-size"),
    ("QUERY_MAX_EXECUTION_TIME", "query.max-execution-time"),
    ("QUERY_MAX_HISTORY", "query.max-history"),
    ("QUERY_MIN_EXPIRE_AGE", "query.min-expire-age"),
    ("QUERY_LIMIT_CHECK_INTERVAL", "query.limit-check-interval"),
    ("ADMISSION_INTERVAL", "admission.interval"),
    ("RESOURCE_GROUPS_PROVIDER", "resource-groups.configuration-manager"),
    ("RESOURCE_GROUPS_CONFIG_FILE", "resource-groups.config-file"),
];

const RESOURCE_GROUPS_PREFIX: &str = "resource-groups.";
const PROVIDER_KEY: &str = "resource-groups.configuration-manager";

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub query: QueryConfig,
    pub admission: AdmissionConfig,
    pub resource_groups: ResourceGroupsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `GATEHOUSE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or("GATEHOUSE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let mut properties = HashMap::new();
        for (env_key, property) in ENV_PROPERTY_KEYS {
            if let Some(v) = profiled_env_opt(&p, env_key) {
                properties.insert(property.to_string(), v);
            }
        }
        let mut config = Self::from_properties(&properties)?;
        config.profile = p;
        Ok(config)
    }

    /// Build config from a flat property map (`query.max-cpu-time = 1ms`, ...).
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            profile: String::new(),
            query: QueryConfig::from_properties(properties)?,
            admission: AdmissionConfig::from_properties(properties)?,
            resource_groups: ResourceGroupsConfig::from_properties(properties),
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  limits:      {:?}", self.query.limits);
        tracing::info!(
            "  retention:   max_history={}, min_expire_age={:?}",
            self.query.max_history,
            self.query.min_expire_age
        );
        tracing::info!(
            "  admission:   interval={:?}, limit_check_interval={:?}",
            self.admission.interval,
            self.admission.limit_check_interval
        );
        tracing::info!(
            "  groups:      provider={}",
            self.resource_groups.provider.as_deref().unwrap_or("(none)")
        );
    }

    /// Return a JSON view suitable for diagnostics endpoints.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "query": {
                "limits": self.query.limits,
                "max_history": self.query.max_history,
                "min_expire_age_ms": self.query.min_expire_age.as_millis() as u64,
            },
            "admission": {
                "interval_ms": self.admission.interval.as_millis() as u64,
                "limit_check_interval_ms": self.admission.limit_check_interval.as_millis() as u64,
            },
            "resource_groups": {
                "provider": self.resource_groups.provider,
                "configured": self.resource_groups.is_configured(),
            },
        })
    }
}

// ── Query ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// System-wide default limits; sessions may tighten them.
    pub limits: QueryLimits,
    /// Terminal queries retained before eviction is considered.
    pub max_history: usize,
    /// Minimum age of a terminal query before it may be evicted.
    pub min_expire_age: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            limits: QueryLimits::unbounded(),
            max_history: 100,
            min_expire_age: Duration::from_secs(15 * 60),
        }
    }
}

impl QueryConfig {
    fn from_properties(p: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            limits: QueryLimits::from_properties(p)?,
            max_history: usize_property(p, "query.max-history")?.unwrap_or(defaults.max_history),
            min_expire_age: duration_property(p, "query.min-expire-age")?
                .unwrap_or(defaults.min_expire_age),
        })
    }
}

// ── Admission ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Period of the admission scheduler cycle.
    pub interval: Duration,
    /// Period of the execution monitor's limit sampling.
    pub limit_check_interval: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            limit_check_interval: Duration::from_millis(100),
        }
    }
}

impl AdmissionConfig {
    fn from_properties(p: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let interval = duration_property(p, "admission.interval")?.unwrap_or(defaults.interval);
        let limit_check_interval = duration_property(p, "query.limit-check-interval")?
            .unwrap_or(defaults.limit_check_interval);
        for (key, value) in [
            ("admission.interval", interval),
            ("query.limit-check-interval", limit_check_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidProperty {
                    key: key.to_string(),
                    value: "0".to_string(),
                    reason: "interval must be positive".to_string(),
                });
            }
        }
        Ok(Self {
            interval,
            limit_check_interval,
        })
    }
}

// ── Resource groups ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGroupsConfig {
    /// Name of the configuration provider (`file`, `static`, ...).
    pub provider: Option<String>,
    /// Remaining `resource-groups.*` properties handed to the provider.
    pub properties: HashMap<String, String>,
}

impl ResourceGroupsConfig {
    fn from_properties(p: &HashMap<String, String>) -> Self {
        let provider = p.get(PROVIDER_KEY).filter(|s| !s.is_empty()).cloned();
        let properties = p
            .iter()
            .filter(|(k, _)| k.starts_with(RESOURCE_GROUPS_PREFIX) && k.as_str() != PROVIDER_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            provider,
            properties,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

fn duration_property(
    p: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    match p.get(key) {
        None => Ok(None),
        Some(raw) => parse_duration(raw)
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(key, raw, "expected a duration like '100ms'")),
    }
}

fn usize_property(p: &HashMap<String, String>, key: &str) -> Result<Option<usize>, ConfigError> {
    match p.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, raw, "expected a non-negative integer")),
    }
}

/// Names of limit properties, for help text and diagnostics.
pub fn limit_property_names() -> Vec<&'static str> {
    LimitKind::CHECK_ORDER.iter().map(|k| k.system_property()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_properties(&HashMap::new()).unwrap();
        assert_eq!(config.query.max_history, 100);
        assert_eq!(config.query.min_expire_age, Duration::from_secs(900));
        assert_eq!(config.admission.interval, Duration::from_millis(100));
        assert_eq!(config.query.limits, QueryLimits::unbounded());
        assert!(!config.resource_groups.is_configured());
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn properties_override_defaults() {
        let config = Config::from_properties(&props(&[
            ("query.max-cpu-time", "1ms"),
            ("query.max-history", "5"),
            ("admission.interval", "20ms"),
            ("resource-groups.configuration-manager", "file"),
            ("resource-groups.config-file", "etc/groups.json"),
        ]))
        .unwrap();
        assert_eq!(config.query.limits.max_cpu_time, Some(Duration::from_millis(1)));
        assert_eq!(config.query.max_history, 5);
        assert_eq!(config.admission.interval, Duration::from_millis(20));
        assert_eq!(config.resource_groups.provider.as_deref(), Some("file"));
        assert_eq!(
            config.resource_groups.properties.get("resource-groups.config-file").map(String::as_str),
            Some("etc/groups.json")
        );
        assert!(!config.resource_groups.properties.contains_key(PROVIDER_KEY));
    }

    #[test]
    fn zero_interval_rejected() {
        let err = Config::from_properties(&props(&[("admission.interval", "0ms")])).unwrap_err();
        assert!(err.to_string().contains("admission.interval"));
    }

    #[test]
    fn malformed_history_rejected() {
        assert!(Config::from_properties(&props(&[("query.max-history", "lots")])).is_err());
    }

    #[test]
    fn redacted_summary_shape() {
        let config = Config::default();
        let summary = config.redacted_summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["admission"]["interval_ms"], 100);
        assert_eq!(summary["resource_groups"]["configured"], false);
    }

    #[test]
    fn limit_property_names_listed() {
        let names = limit_property_names();
        assert!(names.contains(&"query.max-cpu-time"));
        assert_eq!(names.len(), 5);
    }
}
