//! Min-max normalization of a cycle's raw scores into `[0, max_node_score]`.
//!
//! `out = (s - min) * M / (max - min)`, integer division. When every score
//! is equal the range is widened by one below the minimum, so each host maps
//! to `M`.

use podgate_core::ScanSeed;
use podgate_state::ScoreRecord;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    max_node_score: i64,
    seed: ScanSeed,
}

impl ScoreNormalizer {
    pub fn new(max_node_score: i64, seed: ScanSeed) -> Self {
        Self {
            max_node_score,
            seed,
        }
    }

    pub fn max_node_score(&self) -> i64 {
        self.max_node_score
    }

    /// Rescale in place. An empty batch is left untouched.
    pub fn normalize(&self, scores: &mut [ScoreRecord]) {
        let Some((mut min, max)) = self.bounds(scores) else {
            return;
        };
        if max == min {
            min -= 1;
        }

        let range = i128::from(max) - i128::from(min);
        for record in scores.iter_mut() {
            let raw = record.score;
            let scaled = (i128::from(raw) - i128::from(min)) * i128::from(self.max_node_score) / range;
            record.score = scaled as i64;
            debug!(host = %record.host, raw, normalized = record.score, "normalize: rescaled");
        }
    }

    fn bounds(&self, scores: &[ScoreRecord]) -> Option<(i64, i64)> {
        let first = scores.first()?.score;
        let init = match self.seed {
            ScanSeed::Observed => (first, first),
            ScanSeed::Zero => (0, 0),
        };
        Some(
            scores
                .iter()
                .fold(init, |(lo, hi), r| (lo.min(r.score), hi.max(r.score))),
        )
    }
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self::new(100, ScanSeed::Observed)
    }
}
