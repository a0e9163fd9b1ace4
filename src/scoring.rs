//! Distance and ambiguity scoring for candidate reconstructions
//!
//! A candidate is judged by how far it sits from the damaged `(block,
//! digest)` pair. Checksum bits are weighted by `penalty × redundancy`: a
//! flipped checksum bit is far less likely than a flipped block bit of
//! independent physical origin, and the block-to-checksum size ratio
//! normalizes the probability mass.

use crate::bits::bitdist;

/// Shape of the combined block + checksum distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceKind {
    /// `bd + w·cd` — the default.
    #[default]
    Linear,
    /// `bd² + w·cd²` — emphasizes larger divergences.
    Square,
    /// `bd + w·cd²` — superlinear penalty on checksum divergence.
    Conservative,
    /// `bd + w·cd² + cd` — as conservative, ties broken toward exact
    /// checksum matches.
    ConservativeBiased,
}

impl DistanceKind {
    pub fn name(&self) -> &'static str {
        match self {
            DistanceKind::Linear => "linear",
            DistanceKind::Square => "square",
            DistanceKind::Conservative => "conservative",
            DistanceKind::ConservativeBiased => "conservative-biased",
        }
    }

    pub fn parse(s: &str) -> Option<DistanceKind> {
        match s {
            "linear" => Some(DistanceKind::Linear),
            "square" => Some(DistanceKind::Square),
            "conservative" => Some(DistanceKind::Conservative),
            "conservative-biased" => Some(DistanceKind::ConservativeBiased),
            _ => None,
        }
    }
}

/// Distance configuration resolved once per task.
#[derive(Debug, Clone, Copy)]
pub struct DistancePolicy {
    pub kind: DistanceKind,
    /// Checksum penalty `P` (default 1).
    pub penalty: u64,
    /// Redundancy factor `R` = block bytes / digest bytes.
    pub redundancy: u64,
}

impl DistancePolicy {
    /// Combine a block distance and a checksum distance into one score.
    pub fn score(&self, block_dist: u64, digest_dist: u64) -> u64 {
        let w = self.penalty * self.redundancy;
        match self.kind {
            DistanceKind::Linear => block_dist + w * digest_dist,
            DistanceKind::Square => block_dist * block_dist + w * digest_dist * digest_dist,
            DistanceKind::Conservative => block_dist + w * digest_dist * digest_dist,
            DistanceKind::ConservativeBiased => {
                block_dist + w * digest_dist * digest_dist + digest_dist
            }
        }
    }

    /// Distance between two `(block, digest)` pairs.
    pub fn between(
        &self,
        block_a: &[u8],
        digest_a: &[u8],
        block_b: &[u8],
        digest_b: &[u8],
    ) -> u64 {
        self.score(bitdist(block_a, block_b), bitdist(digest_a, digest_b))
    }
}

/// Ambivalence score for a set of two or more candidate distances.
///
/// `round(100·n·min/(avg − min))` when the average exceeds the minimum,
/// otherwise `100·n·min·10000` (all candidates tie). Larger means lower
/// confidence in the minimum-distance candidate.
pub fn ambival(distances: &[u64]) -> u64 {
    debug_assert!(distances.len() > 1);
    let n = distances.len() as u64;
    let min = *distances.iter().min().expect("at least two distances");
    let sum: u64 = distances.iter().sum();
    // avg > min  <=>  sum > n·min; the rounded quotient below is
    // 100·n·min/(avg − min) with avg = sum/n, kept in integers.
    if sum > n * min {
        let num = 100 * n * n * min;
        let den = sum - n * min;
        (num + den / 2) / den
    } else {
        100 * n * min * 10000
    }
}
