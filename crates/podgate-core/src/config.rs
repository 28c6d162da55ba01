//! podgate.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Scheduler name workloads must reference to opt into the extension.
pub const DEFAULT_SCHEDULER_NAME: &str = "test-scheduling";

/// Args blob the orchestrator decodes into the plugin at construction.
///
/// Wire name is camelCase (`maxPods`). A missing field decodes as zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginArgs {
    /// Admission threshold: the cycle is rejected when the namespace holds
    /// more than this many known workloads.
    pub max_pods: u32,
}

impl PluginArgs {
    /// Decode args from the orchestrator's opaque JSON blob.
    ///
    /// `null` is treated as "no args supplied" and yields the defaults.
    pub fn from_json(value: &serde_json::Value) -> ConfigResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(PluginArgs::deserialize(value)?)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PodgateConfig {
    pub scheduler_name: String,
    pub args: PluginArgs,
    pub filter: FilterConfig,
    pub scoring: ScoringConfig,
    pub metrics: MetricsConfig,
    pub permit: PermitConfig,
}

impl Default for PodgateConfig {
    fn default() -> Self {
        Self {
            scheduler_name: DEFAULT_SCHEDULER_NAME.to_string(),
            args: PluginArgs::default(),
            filter: FilterConfig::default(),
            scoring: ScoringConfig::default(),
            metrics: MetricsConfig::default(),
            permit: PermitConfig::default(),
        }
    }
}

/// Host eligibility label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    pub label_key: String,
    pub accepted_value: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            label_key: "scheduling".to_string(),
            accepted_value: "true".to_string(),
        }
    }
}

/// How the normalizer seeds its min/max scan.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanSeed {
    /// Min and max are the extremes actually present in the batch.
    #[default]
    Observed,
    /// Min and max start at zero, so an all-positive batch keeps a floor of 0.
    Zero,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Raw score ceiling `C`; a host with free fraction `f` scores `floor(C * f)`.
    pub scale: f64,
    /// Raw score for hosts the metrics snapshot does not cover.
    pub fallback_score: i64,
    /// Normalized output ceiling `M`.
    pub max_node_score: i64,
    pub seed: ScanSeed,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scale: 50.0,
            fallback_score: 5,
            max_node_score: 100,
            seed: ScanSeed::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricsSourceKind {
    /// Fixed per-host table from `[metrics.static]`.
    #[default]
    Static,
    /// Free-memory fraction derived from the host registry.
    Capacity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub source: MetricsSourceKind,
    /// Host id → free fraction, used by the static source.
    #[serde(rename = "static")]
    pub static_free: BTreeMap<String, f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let mut static_free = BTreeMap::new();
        static_free.insert("node-01".to_string(), 0.4);
        static_free.insert("node-02".to_string(), 0.6);
        Self {
            source: MetricsSourceKind::default(),
            static_free,
        }
    }
}

/// The dependency workload that must exist before a binding is admitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PermitConfig {
    pub namespace: String,
    pub name: String,
    pub delay_secs: u64,
}

impl PermitConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for PermitConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            name: "nginx-66b6c48dd5-t7jph".to_string(),
            delay_secs: 10,
        }
    }
}

impl PodgateConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PodgateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations the stages cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scheduler_name.trim().is_empty() {
            return Err(invalid("scheduler_name must not be empty"));
        }
        if self.filter.label_key.is_empty() {
            return Err(invalid("filter.label_key must not be empty"));
        }
        if !self.scoring.scale.is_finite() || self.scoring.scale <= 0.0 {
            return Err(invalid(format!(
                "scoring.scale must be a positive number, got {}",
                self.scoring.scale
            )));
        }
        // Raw scores must stay non-negative for normalization to reach the ceiling.
        if self.scoring.fallback_score < 0 {
            return Err(invalid(format!(
                "scoring.fallback_score must not be negative, got {}",
                self.scoring.fallback_score
            )));
        }
        if self.scoring.max_node_score <= 0 {
            return Err(invalid(format!(
                "scoring.max_node_score must be positive, got {}",
                self.scoring.max_node_score
            )));
        }
        for (host, fraction) in &self.metrics.static_free {
            if !(0.0..=1.0).contains(fraction) {
                return Err(invalid(format!(
                    "metrics.static.{host} must be within [0, 1], got {fraction}"
                )));
            }
        }
        if self.permit.namespace.is_empty() || self.permit.name.is_empty() {
            return Err(invalid("permit.namespace and permit.name must not be empty"));
        }
        if self.permit.delay_secs == 0 {
            return Err(invalid("permit.delay_secs must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let config = PodgateConfig::default();
        assert_eq!(config.scheduler_name, "test-scheduling");
        assert_eq!(config.args.max_pods, 0);
        assert_eq!(config.filter.label_key, "scheduling");
        assert_eq!(config.filter.accepted_value, "true");
        assert_eq!(config.scoring.scale, 50.0);
        assert_eq!(config.scoring.fallback_score, 5);
        assert_eq!(config.scoring.max_node_score, 100);
        assert_eq!(config.scoring.seed, ScanSeed::Observed);
        assert_eq!(config.metrics.static_free.get("node-01"), Some(&0.4));
        assert_eq!(config.permit.delay(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_empty_document_yields_defaults() {
        let config = PodgateConfig::from_toml_str("").unwrap();
        assert_eq!(config, PodgateConfig::default());
    }

    #[test]
    fn parse_full_document() {
        let toml_str = r#"
scheduler_name = "gated"

[args]
maxPods = 5

[filter]
label_key = "pool"
accepted_value = "batch"

[scoring]
scale = 80.0
fallback_score = 1
max_node_score = 10
seed = "zero"

[metrics]
source = "capacity"

[metrics.static]
"node-a" = 0.25

[permit]
namespace = "infra"
name = "db-0"
delay_secs = 3
"#;
        let config = PodgateConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.scheduler_name, "gated");
        assert_eq!(config.args.max_pods, 5);
        assert_eq!(config.filter.label_key, "pool");
        assert_eq!(config.scoring.seed, ScanSeed::Zero);
        assert_eq!(config.metrics.source, MetricsSourceKind::Capacity);
        assert_eq!(config.metrics.static_free.len(), 1);
        assert_eq!(config.permit.name, "db-0");
        assert_eq!(config.permit.delay(), Duration::from_secs(3));
    }

    #[test]
    fn args_from_json_blob() {
        let args = PluginArgs::from_json(&serde_json::json!({ "maxPods": 7 })).unwrap();
        assert_eq!(args.max_pods, 7);
    }

    #[test]
    fn args_absent_field_is_zero() {
        let args = PluginArgs::from_json(&serde_json::json!({})).unwrap();
        assert_eq!(args.max_pods, 0);

        let args = PluginArgs::from_json(&serde_json::Value::Null).unwrap();
        assert_eq!(args.max_pods, 0);
    }

    #[test]
    fn args_reject_negative_threshold() {
        let result = PluginArgs::from_json(&serde_json::json!({ "maxPods": -1 }));
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn args_reject_wrong_type() {
        let result = PluginArgs::from_json(&serde_json::json!({ "maxPods": "five" }));
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn validate_rejects_bad_scale() {
        let mut config = PodgateConfig::default();
        config.scoring.scale = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.scoring.scale = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_negative_fallback() {
        let mut config = PodgateConfig::default();
        config.scoring.fallback_score = -1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.scoring.fallback_score = 0;
        assert!(config.validate().is_ok());

        let parsed = PodgateConfig::from_toml_str("[scoring]\nfallback_score = -5\n");
        assert!(matches!(parsed, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_fraction() {
        let mut config = PodgateConfig::default();
        config.metrics.static_free.insert("node-09".to_string(), 1.5);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_delay() {
        let mut config = PodgateConfig::default();
        config.permit.delay_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let result = PodgateConfig::from_toml_str("[args\nmaxPods = ");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn toml_round_trip_keeps_values() {
        let mut config = PodgateConfig::default();
        config.args.max_pods = 12;
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("maxPods = 12"));
        let parsed = PodgateConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podgate.toml");
        std::fs::write(&path, "[args]\nmaxPods = 2\n").unwrap();

        let config = PodgateConfig::from_file(&path).unwrap();
        assert_eq!(config.args.max_pods, 2);

        let missing = PodgateConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
