//! podgate-plugin: placement-decision extension for an external orchestrator.
//!
//! The orchestrator drives each placement cycle and calls into this crate at
//! fixed points. This crate never schedules, queues, or binds anything itself.
//!
//! # Components
//!
//! - **`admission`**: namespace workload cap (pre-filter)
//! - **`filter`**: gating-label host exclusion (filter)
//! - **`snapshot`**: once-per-cycle metrics snapshot (pre-score)
//! - **`score`**: raw host score from the snapshot (score)
//! - **`normalize`**: min-max rescale of a cycle's scores (normalize-score)
//! - **`permit`**: dependency-gated binding hold (permit)
//! - **`plugin`**: `CapacityGate`, the stages behind the extension points
//! - **`registry`**: name → factory lookup used by the orchestrator config

pub mod admission;
pub mod error;
pub mod filter;
pub mod framework;
pub mod normalize;
pub mod permit;
pub mod plugin;
pub mod registry;
pub mod score;
pub mod snapshot;
pub mod status;

#[cfg(test)]
mod test_support;

pub use error::{PluginError, PluginResult};
pub use framework::{
    CallContext, FilterPlugin, Handle, PermitPlugin, PlacementPlugin, Plugin, PreFilterExtensions,
    PreFilterPlugin, PreScorePlugin, ScoreExtensions, ScorePlugin,
};
pub use plugin::CapacityGate;
pub use registry::{PluginFactory, Registry};
pub use snapshot::{MetricsSnapshot, MetricsSource, SNAPSHOT_KEY};
pub use status::{Code, Status};
