//! Read-only cluster views lent to the extension by the orchestrator.
//!
//! Both traits separate "absent" (`Ok(None)` / empty list) from "could not
//! ask" (`Err`). Stages map the former to policy outcomes and the latter to
//! an aborted cycle.

use crate::error::StateResult;
use crate::types::{HostCandidate, LabelSelector, WorkloadRef};

/// Query currently known workloads.
pub trait WorkloadLister: Send + Sync {
    /// Workloads in `namespace` whose labels match `selector`.
    fn list_workloads(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> StateResult<Vec<WorkloadRef>>;

    /// A single workload by namespace and name.
    fn get_workload(&self, namespace: &str, name: &str) -> StateResult<Option<WorkloadRef>>;
}

/// Query schedulable hosts.
pub trait HostRegistry: Send + Sync {
    fn list_hosts(&self) -> StateResult<Vec<HostCandidate>>;

    fn get_host(&self, host_id: &str) -> StateResult<Option<HostCandidate>>;
}
