//! `CapacityGate`: the placement extension registered as `test-scheduling`.
//!
//! Composes the six stages behind the orchestrator's extension points.
//! Workloads only reach it when their scheduler name references it; a
//! workload that also pins a host skips host selection and therefore this
//! plugin's filter and score stages.

use std::sync::Arc;
use std::time::Duration;

use podgate_core::{DEFAULT_SCHEDULER_NAME, MetricsSourceKind, PluginArgs, PodgateConfig};
use podgate_state::{CycleStore, HostCandidate, ScoreRecord, WorkloadRef, WorkloadRequest};
use tracing::debug;

use crate::admission::AdmissionGate;
use crate::error::PluginResult;
use crate::filter::EligibilityFilter;
use crate::framework::{
    CallContext, FilterPlugin, Handle, PermitPlugin, Plugin, PreFilterExtensions,
    PreFilterPlugin, PreScorePlugin, ScoreExtensions, ScorePlugin,
};
use crate::normalize::ScoreNormalizer;
use crate::permit::CommitGate;
use crate::score::ScoreComputer;
use crate::snapshot::{CapacityMetrics, MetricsSnapshotter, MetricsSource, StaticMetrics};
use crate::status::Status;

pub struct CapacityGate {
    name: String,
    admission: AdmissionGate,
    filter: EligibilityFilter,
    snapshotter: MetricsSnapshotter,
    scorer: ScoreComputer,
    normalizer: ScoreNormalizer,
    commit: CommitGate,
}

impl CapacityGate {
    pub const NAME: &'static str = DEFAULT_SCHEDULER_NAME;

    /// Build under [`Self::NAME`] from the orchestrator's args blob.
    pub fn new(args: &serde_json::Value, handle: &Handle) -> PluginResult<Self> {
        Self::named(Self::NAME, args, handle)
    }

    /// Factory used by the registry: answer to `name`, decode the args blob,
    /// and run every other stage with its default policy.
    pub fn named(name: &str, args: &serde_json::Value, handle: &Handle) -> PluginResult<Self> {
        let args = PluginArgs::from_json(args)?;
        let config = PodgateConfig {
            scheduler_name: name.to_string(),
            args,
            ..PodgateConfig::default()
        };
        Self::from_config(&config, handle)
    }

    pub fn from_config(config: &PodgateConfig, handle: &Handle) -> PluginResult<Self> {
        config.validate()?;

        let lister = handle.workload_lister();
        let source: Arc<dyn MetricsSource> = match config.metrics.source {
            MetricsSourceKind::Static => {
                Arc::new(StaticMetrics::new(config.metrics.static_free.clone()))
            }
            MetricsSourceKind::Capacity => Arc::new(CapacityMetrics::new(handle.host_registry())),
        };

        debug!(
            name = %config.scheduler_name,
            max_pods = config.args.max_pods,
            source = ?config.metrics.source,
            "capacity gate constructed"
        );

        Ok(Self {
            name: config.scheduler_name.clone(),
            admission: AdmissionGate::new(Arc::clone(&lister), config.args.max_pods),
            filter: EligibilityFilter::new(
                config.filter.label_key.clone(),
                config.filter.accepted_value.clone(),
            ),
            snapshotter: MetricsSnapshotter::new(source),
            scorer: ScoreComputer::new(config.scoring.scale, config.scoring.fallback_score),
            normalizer: ScoreNormalizer::new(config.scoring.max_node_score, config.scoring.seed),
            commit: CommitGate::new(
                lister,
                config.permit.namespace.clone(),
                config.permit.name.clone(),
                config.permit.delay(),
            ),
        })
    }

    /// Whether `workload` opted into this plugin by scheduler name.
    pub fn handles(&self, workload: &WorkloadRequest) -> bool {
        workload.scheduler_name.as_deref() == Some(self.name.as_str())
    }

    pub fn max_node_score(&self) -> i64 {
        self.normalizer.max_node_score()
    }
}

impl Plugin for CapacityGate {
    fn name(&self) -> &str {
        &self.name
    }
}

impl PreFilterPlugin for CapacityGate {
    fn pre_filter(
        &self,
        ctx: &CallContext,
        _state: &dyn CycleStore,
        workload: &WorkloadRequest,
    ) -> Status {
        if let Err(status) = ctx.check() {
            return status;
        }
        self.admission.evaluate(workload)
    }

    fn pre_filter_extensions(&self) -> Option<&dyn PreFilterExtensions> {
        Some(self)
    }
}

/// The admission count is re-read from the lister every cycle, so nominated
/// workloads need no incremental bookkeeping.
impl PreFilterExtensions for CapacityGate {
    fn add_workload(
        &self,
        _ctx: &CallContext,
        _state: &dyn CycleStore,
        _to_schedule: &WorkloadRequest,
        _to_add: &WorkloadRef,
        _host: &HostCandidate,
    ) -> Status {
        Status::success()
    }

    fn remove_workload(
        &self,
        _ctx: &CallContext,
        _state: &dyn CycleStore,
        _to_schedule: &WorkloadRequest,
        _to_remove: &WorkloadRef,
        _host: &HostCandidate,
    ) -> Status {
        Status::success()
    }
}

impl FilterPlugin for CapacityGate {
    fn filter(
        &self,
        ctx: &CallContext,
        _state: &dyn CycleStore,
        _workload: &WorkloadRequest,
        host: &HostCandidate,
    ) -> Status {
        if let Err(status) = ctx.check() {
            return status;
        }
        self.filter.evaluate(host)
    }
}

impl PreScorePlugin for CapacityGate {
    fn pre_score(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        _workload: &WorkloadRequest,
        hosts: &[HostCandidate],
    ) -> Status {
        if let Err(status) = ctx.check() {
            return status;
        }
        self.snapshotter.publish(ctx, state, hosts)
    }
}

impl ScorePlugin for CapacityGate {
    fn score(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        _workload: &WorkloadRequest,
        host_id: &str,
    ) -> Result<i64, Status> {
        ctx.check()?;
        self.scorer.score(state, host_id)
    }

    fn score_extensions(&self) -> Option<&dyn ScoreExtensions> {
        Some(self)
    }
}

impl ScoreExtensions for CapacityGate {
    fn normalize_score(
        &self,
        ctx: &CallContext,
        _state: &dyn CycleStore,
        workload: &WorkloadRequest,
        scores: &mut [ScoreRecord],
    ) -> Status {
        if let Err(status) = ctx.check() {
            return status;
        }
        debug!(workload = %workload.key(), hosts = scores.len(), "normalizing scores");
        self.normalizer.normalize(scores);
        Status::success()
    }
}

impl PermitPlugin for CapacityGate {
    fn permit(
        &self,
        ctx: &CallContext,
        _state: &dyn CycleStore,
        _workload: &WorkloadRequest,
        host_id: &str,
    ) -> (Status, Duration) {
        if let Err(status) = ctx.check() {
            return (status, Duration::ZERO);
        }
        self.commit.evaluate(host_id)
    }
}
