//! podgate-core: configuration for the podgate placement extension.
//!
//! The orchestrator hands each plugin an opaque args blob (`PluginArgs`);
//! the standalone tooling reads the wider `PodgateConfig` from a TOML file.

pub mod config;
pub mod error;

pub use config::{
    DEFAULT_SCHEDULER_NAME, FilterConfig, MetricsConfig, MetricsSourceKind, PermitConfig,
    PluginArgs, PodgateConfig, ScanSeed, ScoringConfig,
};
pub use error::{ConfigError, ConfigResult};
