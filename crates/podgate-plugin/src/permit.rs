//! Commit gate: holds a binding until a dependency workload exists.

use std::sync::Arc;
use std::time::Duration;

use podgate_state::{WorkloadLister, workload_key};
use tracing::{info, warn};

use crate::status::Status;

pub const DEPENDENCY_PENDING: &str = "dependency workload not present";

pub struct CommitGate {
    lister: Arc<dyn WorkloadLister>,
    namespace: String,
    name: String,
    delay: Duration,
}

impl CommitGate {
    pub fn new(
        lister: Arc<dyn WorkloadLister>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            lister,
            namespace: namespace.into(),
            name: name.into(),
            delay,
        }
    }

    /// `(Success, 0)` when the dependency exists, `(Wait, delay)` when it
    /// does not, `(Error, 0)` when the lister cannot answer.
    pub fn evaluate(&self, host_id: &str) -> (Status, Duration) {
        match self.lister.get_workload(&self.namespace, &self.name) {
            Ok(Some(_)) => {
                info!(host = %host_id, "permit: dependency present, binding admitted");
                (Status::success(), Duration::ZERO)
            }
            Ok(None) => {
                info!(
                    host = %host_id,
                    dependency = %workload_key(&self.namespace, &self.name),
                    delay_secs = self.delay.as_secs(),
                    "permit: dependency missing, holding binding"
                );
                (Status::wait(DEPENDENCY_PENDING), self.delay)
            }
            Err(e) => {
                warn!(host = %host_id, error = %e, "permit: workload lister failed");
                (e.into(), Duration::ZERO)
            }
        }
    }
}
