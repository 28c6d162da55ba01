//! Per-cycle metrics snapshot.
//!
//! The snapshotter samples a [`MetricsSource`] once per cycle and publishes
//! the result into the cycle store under [`SNAPSHOT_KEY`], where every
//! per-host score call picks it up.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use podgate_state::{CycleStore, HostCandidate, HostId, HostRegistry, StateResult};
use tracing::{debug, info, warn};

use crate::framework::CallContext;
use crate::status::Status;

/// Cycle-store key the snapshot is published under.
pub const SNAPSHOT_KEY: &str = "podgate/host-free-memory";

/// Host id → free-resource fraction in `[0.0, 1.0]`.
///
/// Readers get a cheap clone sharing the same map; nobody mutates it after
/// publication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    free: Arc<HashMap<HostId, f64>>,
}

impl MetricsSnapshot {
    /// Fractions outside `[0, 1]` are clamped; NaN entries are dropped.
    pub fn new(free: HashMap<HostId, f64>) -> Self {
        let free = free
            .into_iter()
            .filter(|(_, f)| !f.is_nan())
            .map(|(host, f)| (host, f.clamp(0.0, 1.0)))
            .collect();
        Self {
            free: Arc::new(free),
        }
    }

    pub fn free_fraction(&self, host_id: &str) -> Option<f64> {
        self.free.get(host_id).copied()
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// Where free-resource fractions come from.
pub trait MetricsSource: Send + Sync {
    /// Fractions for the given candidates. Hosts the source knows nothing
    /// about are simply left out.
    fn sample(&self, hosts: &[HostCandidate]) -> StateResult<HashMap<HostId, f64>>;
}

/// Fixed per-host table.
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics {
    table: BTreeMap<HostId, f64>,
}

impl StaticMetrics {
    pub fn new(table: BTreeMap<HostId, f64>) -> Self {
        Self { table }
    }
}

impl MetricsSource for StaticMetrics {
    fn sample(&self, hosts: &[HostCandidate]) -> StateResult<HashMap<HostId, f64>> {
        Ok(hosts
            .iter()
            .filter_map(|h| self.table.get(&h.id).map(|f| (h.id.clone(), *f)))
            .collect())
    }
}

/// Free-memory fraction read from the host registry.
pub struct CapacityMetrics {
    registry: Arc<dyn HostRegistry>,
}

impl CapacityMetrics {
    pub fn new(registry: Arc<dyn HostRegistry>) -> Self {
        Self { registry }
    }
}

impl MetricsSource for CapacityMetrics {
    fn sample(&self, hosts: &[HostCandidate]) -> StateResult<HashMap<HostId, f64>> {
        let mut free = HashMap::with_capacity(hosts.len());
        for host in hosts {
            let Some(current) = self.registry.get_host(&host.id)? else {
                continue;
            };
            if let Some(capacity) = current.capacity {
                free.insert(host.id.clone(), capacity.free_fraction());
            }
        }
        Ok(free)
    }
}

pub struct MetricsSnapshotter {
    source: Arc<dyn MetricsSource>,
}

impl MetricsSnapshotter {
    pub fn new(source: Arc<dyn MetricsSource>) -> Self {
        Self { source }
    }

    /// Sample the source and publish the snapshot, replacing any previous one.
    ///
    /// Nothing is written if the call is cancelled before publication.
    pub fn publish(
        &self,
        ctx: &CallContext,
        state: &dyn CycleStore,
        hosts: &[HostCandidate],
    ) -> Status {
        let sampled = match self.source.sample(hosts) {
            Ok(free) => free,
            Err(e) => {
                warn!(error = %e, "pre-score: metrics source failed");
                return e.into();
            }
        };

        if let Err(status) = ctx.check() {
            debug!("pre-score: cancelled before publishing snapshot");
            return status;
        }

        let snapshot = MetricsSnapshot::new(sampled);
        let covered = snapshot.len();
        if let Err(e) = state.write(SNAPSHOT_KEY, Box::new(snapshot)) {
            warn!(error = %e, "pre-score: cycle store write failed");
            return e.into();
        }

        info!(candidates = hosts.len(), covered, "pre-score: metrics snapshot published");
        Status::success()
    }
}
