//! Host eligibility by gating label.

use podgate_state::HostCandidate;
use tracing::debug;

use crate::status::Status;

pub const DISALLOWED_LABEL: &str = "has disallowed gating label";

/// Excludes hosts whose gating label carries anything but the accepted value.
/// Hosts without the label stay eligible.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    label_key: String,
    accepted_value: String,
}

impl EligibilityFilter {
    pub fn new(label_key: impl Into<String>, accepted_value: impl Into<String>) -> Self {
        Self {
            label_key: label_key.into(),
            accepted_value: accepted_value.into(),
        }
    }

    pub fn evaluate(&self, host: &HostCandidate) -> Status {
        match host.labels.get(&self.label_key) {
            Some(value) if *value != self.accepted_value => {
                debug!(
                    host = %host.id,
                    label = %self.label_key,
                    %value,
                    "filter: host excluded"
                );
                Status::unschedulable(DISALLOWED_LABEL)
            }
            _ => Status::success(),
        }
    }
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new("scheduling", "true")
    }
}
