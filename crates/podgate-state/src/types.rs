//! Domain types shared by the placement stages.
//!
//! Workloads and hosts are owned by the orchestrator; the extension only
//! ever sees them by shared reference. All types serialize to JSON so the
//! cluster view can store them in redb and manifests can describe them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Unique identifier for a host in the cluster.
pub type HostId = String;

// ── Workloads ─────────────────────────────────────────────────────

/// The pending workload a placement cycle is trying to place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadRequest {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Scheduler the workload opts into. `None` means the default scheduler.
    #[serde(default)]
    pub scheduler_name: Option<String>,
    /// Host the workload is pinned to, bypassing host selection entirely.
    #[serde(default)]
    pub node_name: Option<HostId>,
}

impl WorkloadRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: HashMap::new(),
            scheduler_name: None,
            node_name: None,
        }
    }

    /// Opt into the named scheduler.
    pub fn with_scheduler(mut self, scheduler_name: impl Into<String>) -> Self {
        self.scheduler_name = Some(scheduler_name.into());
        self
    }

    /// `{namespace}/{name}`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// The record the orchestrator keeps once this workload is known.
    pub fn to_workload_ref(&self) -> WorkloadRef {
        WorkloadRef {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            labels: self.labels.clone(),
            node_name: self.node_name.clone(),
        }
    }
}

/// A workload already known to the orchestrator, as returned by the lister.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Host the workload is bound to, if any.
    #[serde(default)]
    pub node_name: Option<HostId>,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: HashMap::new(),
            node_name: None,
        }
    }

    /// Build the composite key for the workloads table.
    pub fn table_key(&self) -> String {
        workload_key(&self.namespace, &self.name)
    }
}

/// `{namespace}/{name}` key shared by requests and refs.
pub fn workload_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Label query used when listing workloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LabelSelector {
    /// Matches every workload.
    #[default]
    Everything,
    /// Matches workloads carrying all of the given key/value pairs.
    MatchLabels(BTreeMap<String, String>),
}

impl LabelSelector {
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        match self {
            LabelSelector::Everything => true,
            LabelSelector::MatchLabels(required) => required
                .iter()
                .all(|(k, v)| labels.get(k).is_some_and(|lv| lv == v)),
        }
    }
}

// ── Hosts ─────────────────────────────────────────────────────────

/// A schedulable host as seen through the host registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostCandidate {
    pub id: HostId,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Resource figures, when the registry tracks them.
    #[serde(default)]
    pub capacity: Option<HostCapacity>,
}

impl HostCandidate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: HashMap::new(),
            capacity: None,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_capacity(mut self, memory_bytes: u64, used_memory_bytes: u64) -> Self {
        self.capacity = Some(HostCapacity {
            memory_bytes,
            used_memory_bytes,
        });
        self
    }
}

/// Memory capacity and usage for a host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostCapacity {
    /// Total memory (bytes).
    pub memory_bytes: u64,
    /// Memory in use (bytes).
    pub used_memory_bytes: u64,
}

impl HostCapacity {
    pub fn free_memory(&self) -> u64 {
        self.memory_bytes.saturating_sub(self.used_memory_bytes)
    }

    /// Fraction of memory still free, in `[0.0, 1.0]`. A host reporting zero
    /// capacity has nothing free.
    pub fn free_fraction(&self) -> f64 {
        if self.memory_bytes == 0 {
            return 0.0;
        }
        (self.free_memory() as f64 / self.memory_bytes as f64).clamp(0.0, 1.0)
    }
}

// ── Scores ────────────────────────────────────────────────────────

/// One host's score within a cycle. Raw before normalization, bounded after.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRecord {
    pub host: HostId,
    pub score: i64,
}

impl ScoreRecord {
    pub fn new(host: impl Into<String>, score: i64) -> Self {
        Self {
            host: host.into(),
            score,
        }
    }
}
