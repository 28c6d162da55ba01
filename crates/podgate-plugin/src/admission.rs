//! Admission gate: caps how many workloads a namespace may hold before new
//! scheduling attempts are turned away.
//!
//! The count comes from the lister's current snapshot and may race with
//! concurrent admissions; the cap is advisory.

use std::sync::Arc;

use podgate_state::{LabelSelector, WorkloadLister, WorkloadRequest};
use tracing::{debug, warn};

use crate::status::Status;

pub const CAP_EXCEEDED: &str = "cap exceeded";

pub struct AdmissionGate {
    lister: Arc<dyn WorkloadLister>,
    max_pods: u32,
}

impl AdmissionGate {
    pub fn new(lister: Arc<dyn WorkloadLister>, max_pods: u32) -> Self {
        Self { lister, max_pods }
    }

    pub fn max_pods(&self) -> u32 {
        self.max_pods
    }

    /// `Success` while the namespace holds at most `max_pods` workloads,
    /// `Unschedulable` above that, `Error` if the lister fails.
    pub fn evaluate(&self, workload: &WorkloadRequest) -> Status {
        let known = match self
            .lister
            .list_workloads(&workload.namespace, &LabelSelector::Everything)
        {
            Ok(list) => list.len(),
            Err(e) => {
                warn!(
                    namespace = %workload.namespace,
                    error = %e,
                    "admission: workload lister failed"
                );
                return e.into();
            }
        };

        if known > self.max_pods as usize {
            warn!(
                workload = %workload.key(),
                known,
                max_pods = self.max_pods,
                "admission: namespace over cap"
            );
            return Status::unschedulable(CAP_EXCEEDED);
        }

        debug!(workload = %workload.key(), known, max_pods = self.max_pods, "admission: admitted");
        Status::success()
    }
}
