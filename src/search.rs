//! Shared machinery for the repair and restore searches
//!
//! Both engines accumulate candidate hits for one block, then classify
//! the set into instruction records: a lone candidate becomes `HIT!`, an
//! empty set `NOHITS`, and several candidates one `HIT` each plus an
//! ambiguous `HIT?` summary carrying the minimum-distance candidate.

use crate::domain::Digest;
use crate::scoring::{ambival, DistancePolicy};
use crate::sidecar::{InstructionKind, InstructionRecord};

/// Hard cap on checksum computations for one block's search.
///
/// Charged before each computation, so a zero budget forbids even the
/// first attempt.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    limit: u64,
    used: u64,
}

impl Budget {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Reserve `n` operations; false once the cap would be exceeded.
    #[inline]
    pub fn charge(&mut self, n: u64) -> bool {
        if self.used + n > self.limit {
            return false;
        }
        self.used += n;
        true
    }

    pub fn used(&self) -> u64 {
        self.used
    }
}

/// A candidate reconstruction whose digest fell within tolerance.
#[derive(Debug, Clone)]
pub struct Hit {
    pub block: Vec<u8>,
    pub digest: Digest,
    /// Weighted distance from the damaged `(block, digest)` pair.
    pub distance: u64,
}

/// Classified result of one block's search.
#[derive(Debug, Clone)]
pub enum Outcome {
    NoHits,
    Unique(Hit),
    Ambiguous { hits: Vec<Hit>, ambival: u64 },
}

impl Outcome {
    /// Score raw candidates against the damaged pair and classify them.
    pub fn classify(
        candidates: Vec<(Vec<u8>, Digest)>,
        damaged_block: &[u8],
        damaged_digest: &[u8],
        policy: &DistancePolicy,
    ) -> Outcome {
        let mut hits: Vec<Hit> = candidates
            .into_iter()
            .map(|(block, digest)| {
                let distance =
                    policy.between(damaged_block, damaged_digest, &block, digest.as_bytes());
                Hit {
                    block,
                    digest,
                    distance,
                }
            })
            .collect();

        match hits.len() {
            0 => Outcome::NoHits,
            1 => Outcome::Unique(hits.pop().expect("one hit")),
            _ => {
                let distances: Vec<u64> = hits.iter().map(|h| h.distance).collect();
                Outcome::Ambiguous {
                    hits,
                    ambival: ambival(&distances),
                }
            }
        }
    }

    /// Render the outcome as instruction records for `block_index`.
    ///
    /// `NOHITS` carries the damaged pair unchanged so downstream stages
    /// can pick the block up again.
    pub fn into_records(
        self,
        block_index: u64,
        damaged_block: &[u8],
        damaged_digest: &[u8],
    ) -> Vec<InstructionRecord> {
        match self {
            Outcome::NoHits => vec![InstructionRecord::new(
                InstructionKind::NoHits,
                block_index,
                0,
                0,
                damaged_digest.to_vec(),
                damaged_block.to_vec(),
            )],
            Outcome::Unique(hit) => vec![InstructionRecord::new(
                InstructionKind::HitUnique,
                block_index,
                hit.distance,
                0,
                hit.digest.to_vec(),
                hit.block,
            )],
            Outcome::Ambiguous { hits, ambival } => {
                let best = hits
                    .iter()
                    .min_by_key(|h| h.distance)
                    .expect("ambiguous outcome has hits")
                    .clone();
                let mut records: Vec<InstructionRecord> = hits
                    .into_iter()
                    .map(|hit| {
                        InstructionRecord::new(
                            InstructionKind::Hit,
                            block_index,
                            hit.distance,
                            0,
                            hit.digest.to_vec(),
                            hit.block,
                        )
                    })
                    .collect();
                records.push(InstructionRecord::new(
                    InstructionKind::HitAmbiguous,
                    block_index,
                    best.distance,
                    ambival,
                    best.digest.to_vec(),
                    best.block,
                ));
                records
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::DistanceKind;

    fn policy() -> DistancePolicy {
        DistancePolicy {
            kind: DistanceKind::Linear,
            penalty: 1,
            redundancy: 32,
        }
    }

    #[test]
    fn test_budget_charges_up_front() {
        let mut budget = Budget::new(0);
        assert!(!budget.charge(1));
        assert_eq!(budget.used(), 0);

        let mut budget = Budget::new(3);
        assert!(budget.charge(2));
        assert!(!budget.charge(2));
        assert!(budget.charge(1));
        assert_eq!(budget.used(), 3);
    }

    #[test]
    fn test_classify_empty() {
        let outcome = Outcome::classify(Vec::new(), &[0u8; 4], &[0u8; 2], &policy());
        assert!(matches!(outcome, Outcome::NoHits));
        let records = outcome.into_records(6, &[0xAB; 4], &[0xCD; 2]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), Some(InstructionKind::NoHits));
        assert_eq!(records[0].block, vec![0xAB; 4]);
        assert_eq!(records[0].digest, vec![0xCD; 2]);
    }

    #[test]
    fn test_classify_unique() {
        let damaged = [0b0000_0001u8, 0, 0, 0];
        let candidate = vec![0u8; 4];
        let digest = Digest::from_slice(&[0x10, 0x20]);
        let outcome = Outcome::classify(
            vec![(candidate.clone(), digest.clone())],
            &damaged,
            &[0x10, 0x20],
            &policy(),
        );
        let records = outcome.into_records(0, &damaged, &[0x10, 0x20]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), Some(InstructionKind::HitUnique));
        // one flipped block bit, identical digest
        assert_eq!(records[0].distance, 1);
        assert_eq!(records[0].block, candidate);
    }

    #[test]
    fn test_classify_ambiguous_orders_records() {
        let damaged = [0u8; 4];
        let near = vec![0b0000_0001u8, 0, 0, 0];
        let far = vec![0b0000_0111u8, 0, 0, 0];
        let digest = Digest::from_slice(&[0x00, 0x00]);
        let outcome = Outcome::classify(
            vec![
                (far.clone(), digest.clone()),
                (near.clone(), digest.clone()),
            ],
            &damaged,
            &[0x00, 0x00],
            &policy(),
        );
        let Outcome::Ambiguous { ambival, .. } = &outcome else {
            panic!("expected ambiguous outcome");
        };
        assert!(*ambival > 0);

        let records = outcome.into_records(2, &damaged, &[0x00, 0x00]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].kind(), Some(InstructionKind::Hit));
        assert_eq!(records[1].kind(), Some(InstructionKind::Hit));
        let summary = &records[2];
        assert_eq!(summary.kind(), Some(InstructionKind::HitAmbiguous));
        // Summary carries the minimum-distance candidate.
        assert_eq!(summary.block, near);
        assert_eq!(summary.distance, 1);
    }
}
