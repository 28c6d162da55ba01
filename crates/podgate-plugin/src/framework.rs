//! Extension points the orchestrator calls during a placement cycle.
//!
//! ```text
//! pre_filter ─► filter (per host) ─► pre_score ─► score (per host)
//!            ─► normalize_score ─► permit (selected host)
//! ```
//!
//! The orchestrator owns sequencing. In particular `pre_score` must finish
//! before any `score` call of the same cycle, and every `score` call must
//! finish before `normalize_score`. Implementations treat these as
//! preconditions and fail closed when they are violated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use podgate_state::{
    CycleStore, HostCandidate, HostRegistry, ScoreRecord, WorkloadLister, WorkloadRef,
    WorkloadRequest,
};
use tokio_util::sync::CancellationToken;

use crate::status::Status;

/// Per-call context: cancellation and an optional deadline owned by the
/// orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing token, typically one per cycle.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err(Error status)` once the cycle is cancelled or past its deadline.
    pub fn check(&self) -> Result<(), Status> {
        if self.cancel.is_cancelled() {
            return Err(Status::error("placement cycle cancelled"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Status::error("placement cycle deadline exceeded"));
        }
        Ok(())
    }
}

/// Orchestrator-owned read views handed to plugin factories.
#[derive(Clone)]
pub struct Handle {
    workloads: Arc<dyn WorkloadLister>,
    hosts: Arc<dyn HostRegistry>,
}

impl Handle {
    pub fn new(workloads: Arc<dyn WorkloadLister>, hosts: Arc<dyn HostRegistry>) -> Self {
        Self { workloads, hosts }
    }

    pub fn workload_lister(&self) -> Arc<dyn WorkloadLister> {
        Arc::clone(&self.workloads)
    }

    pub fn host_registry(&self) -> Arc<dyn HostRegistry> {
        Arc::clone(&self.hosts)
    }
}

pub trait Plugin: Send + Sync {
    /// Registration name.
    fn name(&self) -> &str;
}

/// Runs once per cycle before any host is considered.
pub trait PreFilterPlugin: Plugin {
    fn pre_filter(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        workload: &WorkloadRequest,
    ) -> Status;

    fn pre_filter_extensions(&self) -> Option<&dyn PreFilterExtensions> {
        None
    }
}

/// Incremental hooks the orchestrator calls while evaluating what-if
/// placements (e.g. nominated workloads during preemption).
pub trait PreFilterExtensions: Send + Sync {
    fn add_workload(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        to_schedule: &WorkloadRequest,
        to_add: &WorkloadRef,
        host: &HostCandidate,
    ) -> Status;

    fn remove_workload(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        to_schedule: &WorkloadRequest,
        to_remove: &WorkloadRef,
        host: &HostCandidate,
    ) -> Status;
}

/// Runs once per candidate host, possibly in parallel.
pub trait FilterPlugin: Plugin {
    fn filter(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        workload: &WorkloadRequest,
        host: &HostCandidate,
    ) -> Status;
}

/// Runs once per cycle with every host that passed filtering.
pub trait PreScorePlugin: Plugin {
    fn pre_score(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        workload: &WorkloadRequest,
        hosts: &[HostCandidate],
    ) -> Status;
}

/// Runs once per feasible host, possibly in parallel.
pub trait ScorePlugin: Plugin {
    /// Raw score for `host_id`, or a non-success status.
    fn score(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        workload: &WorkloadRequest,
        host_id: &str,
    ) -> Result<i64, Status>;

    fn score_extensions(&self) -> Option<&dyn ScoreExtensions> {
        None
    }
}

pub trait ScoreExtensions: Send + Sync {
    /// Rescale the whole batch in place.
    fn normalize_score(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        workload: &WorkloadRequest,
        scores: &mut [ScoreRecord],
    ) -> Status;
}

/// Runs once on the host the orchestrator selected.
pub trait PermitPlugin: Plugin {
    /// `Wait` comes with the delay after which the orchestrator asks again.
    fn permit(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        workload: &WorkloadRequest,
        host_id: &str,
    ) -> (Status, Duration);
}

/// A plugin implementing every extension point.
pub trait PlacementPlugin:
    PreFilterPlugin + FilterPlugin + PreScorePlugin + ScorePlugin + PermitPlugin
{
}

impl<T> PlacementPlugin for T where
    T: PreFilterPlugin + FilterPlugin + PreScorePlugin + ScorePlugin + PermitPlugin
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;

    #[test]
    fn fresh_context_passes_check() {
        assert!(CallContext::new().check().is_ok());
    }

    #[test]
    fn cancelled_context_fails_check() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        token.cancel();

        let err = ctx.check().unwrap_err();
        assert_eq!(err.code(), Code::Error);
        assert!(err.message().contains("cancelled"));
    }

    #[test]
    fn expired_deadline_fails_check() {
        let ctx = CallContext::new().with_deadline(Instant::now() - Duration::from_millis(1));
        let err = ctx.check().unwrap_err();
        assert!(err.message().contains("deadline"));
    }

    #[test]
    fn future_deadline_passes_check() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(60));
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_some());
    }
}
