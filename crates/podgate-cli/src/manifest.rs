//! Cluster manifests: the hosts and workloads a local run starts from.
//!
//! ```toml
//! [[hosts]]
//! id = "node-01"
//! labels = { scheduling = "true" }
//!
//! [[workloads]]
//! namespace = "default"
//! name = "existing-0"
//!
//! [[pending]]
//! namespace = "default"
//! name = "web-0"
//! scheduler_name = "test-scheduling"
//! ```
//!
//! Files ending in `.json` are read as JSON, everything else as TOML.

use std::path::Path;

use anyhow::Context;
use podgate_state::{ClusterStore, HostCandidate, WorkloadRef, WorkloadRequest};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct ClusterManifest {
    #[serde(default)]
    pub hosts: Vec<HostCandidate>,
    /// Workloads already known to the cluster.
    #[serde(default)]
    pub workloads: Vec<WorkloadRef>,
    /// Workloads waiting for a placement cycle.
    #[serde(default)]
    pub pending: Vec<WorkloadRequest>,
}

impl ClusterManifest {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let manifest = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON manifest {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("parsing TOML manifest {}", path.display()))?
        };
        Ok(manifest)
    }

    /// Look up a pending workload by `namespace/name`.
    pub fn pending_workload(&self, key: &str) -> anyhow::Result<&WorkloadRequest> {
        self.pending
            .iter()
            .find(|w| w.key() == key)
            .ok_or_else(|| anyhow::anyhow!("no pending workload {key} in manifest"))
    }

    /// Load hosts and existing workloads into a fresh in-memory cluster view.
    pub fn into_store(&self) -> anyhow::Result<ClusterStore> {
        let store = ClusterStore::open_in_memory()?;
        for host in &self.hosts {
            store.put_host(host)?;
        }
        for workload in &self.workloads {
            store.put_workload(workload)?;
        }
        info!(
            hosts = self.hosts.len(),
            workloads = self.workloads.len(),
            pending = self.pending.len(),
            "cluster manifest loaded"
        );
        Ok(store)
    }
}
