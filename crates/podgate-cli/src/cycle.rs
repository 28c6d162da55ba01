//! A single-process placement cycle driver.
//!
//! Plays the orchestrator's part for one pending workload: it owns the cycle
//! store, invokes each extension point in order, fans per-host stages out over
//! scoped threads, and holds the binding while permit answers Wait.

use std::time::Duration;

use podgate_plugin::{
    CallContext, Code, FilterPlugin, PermitPlugin, PlacementPlugin, Plugin, PreFilterPlugin,
    PreScorePlugin, ScorePlugin, Status,
};
use podgate_state::{
    ClusterStore, CycleState, HostCandidate, HostRegistry, ScoreRecord, StateResult, WorkloadRef,
    WorkloadRequest,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The extension was not consulted for this workload.
    Bypassed { reason: String },
    Bound { host: String, score: Option<i64> },
    /// A stage declared the workload unplaceable this cycle.
    Rejected { stage: Stage, reason: String },
    /// A stage failed or the cycle was cancelled.
    Aborted { stage: Stage, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreFilter,
    Filter,
    PreScore,
    Score,
    NormalizeScore,
    Permit,
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bypassed { reason } => write!(f, "bypassed: {reason}"),
            Self::Bound { host, score: Some(score) } => write!(f, "bound to {host} (score {score})"),
            Self::Bound { host, score: None } => write!(f, "bound to {host}"),
            Self::Rejected { stage, reason } => write!(f, "rejected at {stage:?}: {reason}"),
            Self::Aborted { stage, detail } => write!(f, "aborted at {stage:?}: {detail}"),
        }
    }
}

fn outcome_for(stage: Stage, status: &Status) -> CycleOutcome {
    match status.code() {
        Code::Unschedulable => CycleOutcome::Rejected {
            stage,
            reason: status.message(),
        },
        _ => CycleOutcome::Aborted {
            stage,
            detail: status.message(),
        },
    }
}

/// The cluster as the driver sees it: schedulable hosts, plus somewhere to
/// record the pending workload so admission counts it like any other.
pub trait ClusterView: HostRegistry {
    fn record_pending(&self, workload: &WorkloadRef) -> StateResult<()>;
}

impl ClusterView for ClusterStore {
    fn record_pending(&self, workload: &WorkloadRef) -> StateResult<()> {
        self.put_workload(workload)
    }
}

pub struct CycleDriver<'a> {
    plugin: &'a dyn PlacementPlugin,
    cluster: &'a dyn ClusterView,
    permit_timeout: Duration,
}

impl<'a> CycleDriver<'a> {
    pub fn new(
        plugin: &'a dyn PlacementPlugin,
        cluster: &'a dyn ClusterView,
        permit_timeout: Duration,
    ) -> Self {
        Self {
            plugin,
            cluster,
            permit_timeout,
        }
    }

    /// Run one placement cycle for `workload`.
    pub async fn run(
        &self,
        ctx: &CallContext,
        workload: &WorkloadRequest,
    ) -> anyhow::Result<CycleOutcome> {
        // The workload exists in the cluster before any scheduler sees it.
        if let Err(e) = self.cluster.record_pending(&workload.to_workload_ref()) {
            warn!(workload = %workload.key(), error = %e, "could not record pending workload");
            return Ok(CycleOutcome::Aborted {
                stage: Stage::PreFilter,
                detail: e.to_string(),
            });
        }

        if workload.scheduler_name.as_deref() != Some(self.plugin.name()) {
            debug!(workload = %workload.key(), "workload does not opt in, bypassing");
            return Ok(CycleOutcome::Bypassed {
                reason: "workload does not opt into this scheduler".to_string(),
            });
        }
        if let Some(host) = &workload.node_name {
            debug!(workload = %workload.key(), %host, "workload pinned, bypassing");
            return Ok(CycleOutcome::Bypassed {
                reason: format!("workload pinned to {host}"),
            });
        }

        let state = CycleState::new();
        info!(workload = %workload.key(), "placement cycle started");

        let status = self.plugin.pre_filter(ctx, &state, workload);
        if !status.is_success() {
            return Ok(outcome_for(Stage::PreFilter, &status));
        }

        let hosts = match self.cluster.list_hosts() {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(error = %e, "host registry failed");
                return Ok(CycleOutcome::Aborted {
                    stage: Stage::Filter,
                    detail: e.to_string(),
                });
            }
        };
        let feasible = match self.filter_hosts(ctx, &state, workload, &hosts) {
            Ok(feasible) => feasible,
            Err(status) => return Ok(outcome_for(Stage::Filter, &status)),
        };
        info!(total = hosts.len(), feasible = feasible.len(), "filter complete");

        let (host, score) = match feasible.as_slice() {
            [] => {
                return Ok(CycleOutcome::Rejected {
                    stage: Stage::Filter,
                    reason: "no feasible host".to_string(),
                });
            }
            // A lone feasible host wins without scoring.
            [only] => (only.id.clone(), None),
            _ => match self.rank_hosts(ctx, &state, workload, &feasible) {
                Ok(best) => (best.host, Some(best.score)),
                Err(outcome) => return Ok(outcome),
            },
        };

        self.await_permit(ctx, &state, workload, host, score).await
    }

    /// Run filter for every host concurrently. Returns the feasible hosts in
    /// registry order, or the first non-policy failure.
    fn filter_hosts(
        &self,
        ctx: &CallContext,
        state: &CycleState,
        workload: &WorkloadRequest,
        hosts: &[HostCandidate],
    ) -> Result<Vec<HostCandidate>, Status> {
        let statuses: Vec<Status> = std::thread::scope(|s| {
            let handles: Vec<_> = hosts
                .iter()
                .map(|host| s.spawn(move || self.plugin.filter(ctx, state, workload, host)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Status::error("filter worker panicked"))
                })
                .collect()
        });

        let mut feasible = Vec::new();
        for (host, status) in hosts.iter().zip(statuses) {
            match status.code() {
                Code::Success => feasible.push(host.clone()),
                Code::Unschedulable => debug!(host = %host.id, reason = %status.message(), "host filtered out"),
                _ => return Err(status),
            }
        }
        Ok(feasible)
    }

    /// Pre-score, score every feasible host concurrently, normalize, and pick
    /// the top host. Ties go to the host listed first.
    fn rank_hosts(
        &self,
        ctx: &CallContext,
        state: &CycleState,
        workload: &WorkloadRequest,
        feasible: &[HostCandidate],
    ) -> Result<ScoreRecord, CycleOutcome> {
        let status = self.plugin.pre_score(ctx, state, workload, feasible);
        if !status.is_success() {
            return Err(outcome_for(Stage::PreScore, &status));
        }

        let results: Vec<Result<i64, Status>> = std::thread::scope(|s| {
            let handles: Vec<_> = feasible
                .iter()
                .map(|host| s.spawn(move || self.plugin.score(ctx, state, workload, &host.id)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(Status::error("score worker panicked")))
                })
                .collect()
        });

        let mut scores = Vec::with_capacity(feasible.len());
        for (host, result) in feasible.iter().zip(results) {
            match result {
                Ok(score) => scores.push(ScoreRecord::new(host.id.clone(), score)),
                Err(status) => return Err(outcome_for(Stage::Score, &status)),
            }
        }

        if let Some(ext) = self.plugin.score_extensions() {
            let status = ext.normalize_score(ctx, state, workload, &mut scores);
            if !status.is_success() {
                return Err(outcome_for(Stage::NormalizeScore, &status));
            }
        }

        let mut ranked = scores.into_iter();
        let first = ranked.next().ok_or_else(|| CycleOutcome::Aborted {
            stage: Stage::Score,
            detail: "no scores produced".to_string(),
        })?;
        let best = ranked.fold(first, |best, r| if r.score > best.score { r } else { best });
        info!(host = %best.host, score = best.score, "host selected");
        Ok(best)
    }

    /// Re-invoke permit after each Wait until it settles, the permit timeout
    /// elapses, or the cycle is cancelled.
    async fn await_permit(
        &self,
        ctx: &CallContext,
        state: &CycleState,
        workload: &WorkloadRequest,
        host: String,
        score: Option<i64>,
    ) -> anyhow::Result<CycleOutcome> {
        let deadline = Instant::now() + self.permit_timeout;
        loop {
            let (status, delay) = self.plugin.permit(ctx, state, workload, &host);
            match status.code() {
                Code::Success => {
                    info!(workload = %workload.key(), %host, "binding admitted");
                    return Ok(CycleOutcome::Bound { host, score });
                }
                Code::Wait => {
                    if Instant::now() + delay > deadline {
                        warn!(%host, "permit wait exceeded timeout");
                        return Ok(CycleOutcome::Rejected {
                            stage: Stage::Permit,
                            reason: format!("timed out waiting: {}", status.message()),
                        });
                    }
                    debug!(%host, delay_secs = delay.as_secs(), "permit waiting");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancellation().cancelled() => {
                            return Ok(CycleOutcome::Aborted {
                                stage: Stage::Permit,
                                detail: "cycle cancelled".to_string(),
                            });
                        }
                    }
                }
                _ => return Ok(outcome_for(Stage::Permit, &status)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgate_core::PodgateConfig;
    use podgate_plugin::{CapacityGate, Handle};
    use podgate_state::{StateError, WorkloadLister};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const DEPENDENCY: &str = "nginx-66b6c48dd5-t7jph";

    fn store_with_hosts(hosts: &[HostCandidate]) -> ClusterStore {
        let store = ClusterStore::open_in_memory().unwrap();
        for host in hosts {
            store.put_host(host).unwrap();
        }
        store
    }

    fn gate(store: &ClusterStore, max_pods: u32) -> CapacityGate {
        let mut config = PodgateConfig::default();
        config.args.max_pods = max_pods;
        let handle = Handle::new(Arc::new(store.clone()), Arc::new(store.clone()));
        CapacityGate::from_config(&config, &handle).unwrap()
    }

    fn pending() -> WorkloadRequest {
        WorkloadRequest::new("default", "web-0").with_scheduler("test-scheduling")
    }

    fn two_hosts() -> Vec<HostCandidate> {
        vec![HostCandidate::new("node-01"), HostCandidate::new("node-02")]
    }

    #[tokio::test]
    async fn non_opted_in_workload_bypasses() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let workload = WorkloadRequest::new("default", "web-0");
        let outcome = driver.run(&CallContext::new(), &workload).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Bypassed { .. }));
    }

    #[tokio::test]
    async fn pinned_workload_bypasses() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let mut workload = pending();
        workload.node_name = Some("node-02".to_string());
        let outcome = driver.run(&CallContext::new(), &workload).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Bypassed {
                reason: "workload pinned to node-02".to_string()
            }
        );
    }

    #[tokio::test]
    async fn binds_highest_scoring_host() {
        let store = store_with_hosts(&two_hosts());
        store.put_workload(&WorkloadRef::new("default", DEPENDENCY)).unwrap();
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Bound {
                host: "node-02".to_string(),
                score: Some(100)
            }
        );
    }

    #[tokio::test]
    async fn cap_exceeded_rejects_at_pre_filter() {
        let store = store_with_hosts(&two_hosts());
        store.put_workload(&WorkloadRef::new("default", DEPENDENCY)).unwrap();
        store.put_workload(&WorkloadRef::new("default", "other")).unwrap();
        let plugin = gate(&store, 1);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Rejected {
                stage: Stage::PreFilter,
                reason: "cap exceeded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn zero_cap_rejects_the_pending_workload_itself() {
        let store = store_with_hosts(&[HostCandidate::new("node-01")]);
        store.put_workload(&WorkloadRef::new("infra", DEPENDENCY)).unwrap();
        let plugin = gate(&store, 0);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Rejected {
                stage: Stage::PreFilter,
                reason: "cap exceeded".to_string()
            }
        );
        assert!(store.get_workload("default", "web-0").unwrap().is_some());
    }

    #[tokio::test]
    async fn pending_workload_counts_toward_cap() {
        let store = store_with_hosts(&two_hosts());
        store.put_workload(&WorkloadRef::new("default", DEPENDENCY)).unwrap();

        let outcome = CycleDriver::new(&gate(&store, 2), &store, Duration::from_secs(60))
            .run(&CallContext::new(), &pending())
            .await
            .unwrap();
        assert!(matches!(outcome, CycleOutcome::Bound { .. }));

        let outcome = CycleDriver::new(&gate(&store, 1), &store, Duration::from_secs(60))
            .run(&CallContext::new(), &pending())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Rejected { stage: Stage::PreFilter, .. }
        ));
    }

    /// Registry whose backend is unreachable.
    struct RegistryDown;

    impl HostRegistry for RegistryDown {
        fn list_hosts(&self) -> StateResult<Vec<HostCandidate>> {
            Err(StateError::Unavailable("registry down".to_string()))
        }

        fn get_host(&self, _: &str) -> StateResult<Option<HostCandidate>> {
            Err(StateError::Unavailable("registry down".to_string()))
        }
    }

    impl ClusterView for RegistryDown {
        fn record_pending(&self, _: &WorkloadRef) -> StateResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn host_registry_failure_aborts_at_filter() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &RegistryDown, Duration::from_secs(60));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Aborted {
                stage: Stage::Filter,
                detail: "unavailable: registry down".to_string()
            }
        );
    }

    #[tokio::test]
    async fn no_feasible_host_rejects() {
        let store = store_with_hosts(&[HostCandidate::new("node-01").with_label("scheduling", "no")]);
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Rejected { stage: Stage::Filter, .. }
        ));
    }

    #[tokio::test]
    async fn single_feasible_host_skips_scoring() {
        let store = store_with_hosts(&[
            HostCandidate::new("node-01").with_label("scheduling", "false"),
            HostCandidate::new("node-07"),
        ]);
        store.put_workload(&WorkloadRef::new("default", DEPENDENCY)).unwrap();
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Bound {
                host: "node-07".to_string(),
                score: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_resolves_when_dependency_appears() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            writer.put_workload(&WorkloadRef::new("default", DEPENDENCY)).unwrap();
        });

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Bound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_without_dependency() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(25));

        let outcome = driver.run(&CallContext::new(), &pending()).await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Rejected { stage: Stage::Permit, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_permit_wait() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(600));

        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            token.cancel();
        });

        let outcome = driver.run(&ctx, &pending()).await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Aborted {
                stage: Stage::Permit,
                detail: "cycle cancelled".to_string()
            }
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_aborts_at_pre_filter() {
        let store = store_with_hosts(&two_hosts());
        let plugin = gate(&store, 5);
        let driver = CycleDriver::new(&plugin, &store, Duration::from_secs(60));

        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::new().with_cancellation(token);

        let outcome = driver.run(&ctx, &pending()).await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Aborted { stage: Stage::PreFilter, .. }
        ));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let outcome = CycleOutcome::Bound {
            host: "node-02".to_string(),
            score: Some(100),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "bound");
        assert_eq!(json["host"], "node-02");
        assert_eq!(outcome.to_string(), "bound to node-02 (score 100)");
    }
}
