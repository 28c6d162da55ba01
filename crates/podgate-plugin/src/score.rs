//! Raw host scoring from the published metrics snapshot.

use podgate_state::{CycleStore, StateError, read_typed};
use tracing::{debug, warn};

use crate::snapshot::{MetricsSnapshot, SNAPSHOT_KEY};
use crate::status::Status;

pub const SNAPSHOT_MISSING: &str = "metrics snapshot unavailable";

/// Turns a host's free fraction `f` into `floor(scale * f)`.
///
/// Hosts the snapshot does not cover get `fallback` rather than being
/// disqualified. A missing snapshot fails closed.
#[derive(Debug, Clone, Copy)]
pub struct ScoreComputer {
    scale: f64,
    fallback: i64,
}

impl ScoreComputer {
    pub fn new(scale: f64, fallback: i64) -> Self {
        Self { scale, fallback }
    }

    pub fn raw_score(&self, free_fraction: f64) -> i64 {
        (self.scale * free_fraction).floor() as i64
    }

    pub fn score(&self, state: &dyn CycleStore, host_id: &str) -> Result<i64, Status> {
        let snapshot: MetricsSnapshot = match read_typed(state, SNAPSHOT_KEY) {
            Ok(snapshot) => snapshot,
            Err(e @ (StateError::NotFound(_) | StateError::TypeMismatch { .. })) => {
                warn!(host = %host_id, error = %e, "score: no usable metrics snapshot");
                return Err(Status::unschedulable(SNAPSHOT_MISSING));
            }
            Err(e) => {
                warn!(host = %host_id, error = %e, "score: cycle store read failed");
                return Err(e.into());
            }
        };

        match snapshot.free_fraction(host_id) {
            Some(free) => {
                let score = self.raw_score(free);
                debug!(host = %host_id, free, score, "score: computed");
                Ok(score)
            }
            None => {
                debug!(host = %host_id, score = self.fallback, "score: host not in snapshot, using fallback");
                Ok(self.fallback)
            }
        }
    }
}

impl Default for ScoreComputer {
    fn default() -> Self {
        Self::new(50.0, 5)
    }
}
