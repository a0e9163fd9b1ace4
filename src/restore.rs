//! Backup-assisted restore search
//!
//! Second-stage recovery for blocks repair could not settle. The damaged
//! block and its backup copy usually agree except where one of them
//! decayed, so the search space is the set of divergent bit positions:
//! every way of choosing, position by position, which copy to believe.
//! Assignments are enumerated by transition count so bursty damage is
//! tried first.

use crate::bits::{bitdist, diff_positions, flip_bit, transition_tuples, assignment_masks};
use crate::blockio::read_block_at;
use crate::checksum::ChecksumMethod;
use crate::config::{SearchOptions, SearchParams};
use crate::domain::Digest;
use crate::error::{Result, TaskError};
use crate::report::TaskSummary;
use crate::search::{Budget, Outcome};
use crate::scoring::DistancePolicy;
use crate::sidecar::{
    self, InstructionKind, InstructionRecord, SidecarWriter, TwinWriter, HEADER_LEN,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Which repair outcomes the restore pass takes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Unresolved and ambiguous blocks alike.
    #[default]
    All,
    /// Only unresolved blocks; leave ambiguous ones as repair scored them.
    AmbiNo,
    /// Only ambiguous blocks.
    AmbiOnly,
}

impl RestoreMode {
    pub fn name(&self) -> &'static str {
        match self {
            RestoreMode::All => "all",
            RestoreMode::AmbiNo => "ambi_no",
            RestoreMode::AmbiOnly => "ambi_only",
        }
    }

    pub fn parse(s: &str) -> Option<RestoreMode> {
        match s {
            "all" => Some(RestoreMode::All),
            "ambi_no" => Some(RestoreMode::AmbiNo),
            "ambi_only" => Some(RestoreMode::AmbiOnly),
            _ => None,
        }
    }

    fn targets(&self, kind: InstructionKind) -> bool {
        let ambiguous = kind == InstructionKind::HitAmbiguous;
        let unresolved = matches!(
            kind,
            InstructionKind::NoHits
                | InstructionKind::BlockLengthMismatch
                | InstructionKind::ChecksumLengthMismatch
                | InstructionKind::Tamper
        );
        match self {
            RestoreMode::All => unresolved || ambiguous,
            RestoreMode::AmbiNo => unresolved,
            RestoreMode::AmbiOnly => ambiguous,
        }
    }
}

struct WorkItem {
    block_index: u64,
    /// Damaged block, from the repair instruction record.
    x: Vec<u8>,
    /// Stored digest for the damaged block, from the same record.
    c: Vec<u8>,
    /// Backup block at the same index.
    y: Vec<u8>,
    /// Digest stored in the backup checksum sidecar.
    c_b: Vec<u8>,
}

/// Run the restore search over the targeted repair records and write
/// classified instruction records in ascending block order.
pub fn restore(
    options: &SearchOptions,
    mode: RestoreMode,
    repair_path: &Path,
    backup_path: &Path,
    backup_checksum_path: &Path,
    restore_path: &Path,
) -> Result<TaskSummary> {
    let (header, records) = sidecar::read_instruction_sidecar(repair_path)?;
    let (backup_header, mut backup_digests) = sidecar::read_header(backup_checksum_path)?;
    let backup_digest_len = backup_header.digest_bytes();

    let config = options.for_header(&header);
    let params = config.calibrate();
    let policy = config.policy();
    debug!(
        "restore: mode {} divergence width {} tolerance {}",
        mode.name(),
        params.restore_width,
        params.tolerance
    );

    let mut backup = File::open(backup_path).map_err(|source| TaskError::Open {
        file: backup_path.to_path_buf(),
        source,
    })?;

    // Gather the targeted records and their backup counterparts with
    // sequential I/O before the parallel search.
    let mut work = Vec::new();
    for record in records {
        let Some(kind) = record.kind() else {
            warn!(
                "{}: unknown record tag {:?} for block {}",
                repair_path.display(),
                record.kind_tag,
                record.block_index
            );
            continue;
        };
        if !mode.targets(kind) {
            continue;
        }

        let y = read_block_at(&mut backup, backup_path, record.block_index, header.block_bytes)?;
        let offset = HEADER_LEN as u64 + record.block_index * u64::from(backup_digest_len);
        backup_digests
            .seek(SeekFrom::Start(offset))
            .map_err(|source| TaskError::Seek {
                file: backup_checksum_path.to_path_buf(),
                offset,
                source,
            })?;
        let mut c_b = vec![0u8; backup_digest_len as usize];
        backup_digests
            .read_exact(&mut c_b)
            .map_err(|source| TaskError::Read {
                file: backup_checksum_path.to_path_buf(),
                source,
            })?;

        work.push(WorkItem {
            block_index: record.block_index,
            x: record.block,
            c: record.digest,
            y,
            c_b,
        });
    }

    let results: Vec<_> = work
        .par_iter()
        .map(|item| restore_block(header.method, &params, &policy, item))
        .collect();

    let mut writer = SidecarWriter::create(restore_path, &header)?;
    let mut twin = TwinWriter::create(restore_path)?;
    let mut summary = TaskSummary::default();
    for records in results {
        if records.is_empty() {
            // Divergence beyond the search width with an unconfirmed
            // backup: warned and skipped.
            summary.record_failed();
            continue;
        }
        for record in records {
            twin.line(&record.describe())?;
            match record.kind() {
                Some(InstructionKind::HitUnique) => summary.record_ok(),
                Some(InstructionKind::HitAmbiguous) => summary.record_ambiguous(),
                Some(
                    InstructionKind::NoHits
                    | InstructionKind::BlockLengthMismatch
                    | InstructionKind::ChecksumLengthMismatch,
                ) => summary.record_failed(),
                _ => {}
            }
            writer.write_instruction(&record)?;
        }
    }
    writer.finish()?;
    twin.finish()?;

    info!("{}: {}", restore_path.display(), summary);
    Ok(summary)
}

/// Search one block against its backup. An empty result means the block
/// was skipped entirely (warned divergence overflow).
fn restore_block(
    method: ChecksumMethod,
    params: &SearchParams,
    policy: &DistancePolicy,
    item: &WorkItem,
) -> Vec<InstructionRecord> {
    if item.x.len() != item.y.len() {
        return vec![InstructionRecord::new(
            InstructionKind::BlockLengthMismatch,
            item.block_index,
            0,
            0,
            item.c.clone(),
            item.x.clone(),
        )];
    }
    if item.c.len() != item.c_b.len() {
        return vec![InstructionRecord::new(
            InstructionKind::ChecksumLengthMismatch,
            item.block_index,
            0,
            0,
            item.c.clone(),
            item.x.clone(),
        )];
    }

    let positions = diff_positions(&item.x, &item.y);
    let divergence = positions.len();
    let mut budget = Budget::new(params.budgets.restore);

    let candidates = if divergence == 0 {
        // Data and backup agree; only the stored digests can be at fault.
        let mut found = Vec::new();
        if budget.charge(1) {
            let digest = method.compute(&item.x);
            if within(&digest, item, params.tolerance) {
                found.push((item.x.clone(), digest));
            }
        }
        found
    } else if divergence as u32 > params.restore_width {
        // Too many divergent bits to enumerate. The backup may still be
        // the original if its content matches the stored digest exactly.
        if budget.charge(1) && method.compute(&item.y).as_bytes() == item.c.as_slice() {
            vec![(item.y.clone(), Digest::from_slice(&item.c))]
        } else {
            warn!(
                "block {}: {} divergent bits exceed the restore width {}; skipped",
                item.block_index, divergence, params.restore_width
            );
            return Vec::new();
        }
    } else {
        enumerate_assignments(method, params, &mut budget, item, &positions)
    };

    Outcome::classify(candidates, &item.x, &item.c, policy).into_records(
        item.block_index,
        &item.x,
        &item.c,
    )
}

/// Transition-ordered enumeration of the `2^D` ways to mix data and
/// backup bits at the divergent positions.
fn enumerate_assignments(
    method: ChecksumMethod,
    params: &SearchParams,
    budget: &mut Budget,
    item: &WorkItem,
    positions: &[usize],
) -> Vec<(Vec<u8>, Digest)> {
    let d = positions.len();
    let mut found = Vec::new();

    'search: for transitions in 0..d {
        for tuple in transition_tuples(d - 1, transitions) {
            // Two candidates per tuple: starting at the data bit and at
            // the backup bit.
            if !budget.charge(2) {
                debug!(
                    "block {}: budget exhausted after {} operations",
                    item.block_index,
                    budget.used()
                );
                break 'search;
            }
            let (first, second) = assignment_masks(&tuple, d);
            for mask in [first, second] {
                let mut candidate = item.x.clone();
                let mut rest = mask;
                while rest != 0 {
                    let j = rest.trailing_zeros() as usize;
                    flip_bit(&mut candidate, positions[j]);
                    rest &= rest - 1;
                }
                let digest = method.compute(&candidate);
                if within(&digest, item, params.tolerance) {
                    found.push((candidate, digest));
                }
            }
        }
    }
    found
}

/// Accepted when strictly inside tolerance of either stored digest.
#[inline]
fn within(digest: &Digest, item: &WorkItem, tolerance: u64) -> bool {
    bitdist(digest.as_bytes(), &item.c) < tolerance
        || bitdist(digest.as_bytes(), &item.c_b) < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Budgets;

    fn item(x: Vec<u8>, c: Vec<u8>, y: Vec<u8>, c_b: Vec<u8>) -> WorkItem {
        WorkItem {
            block_index: 0,
            x,
            c,
            y,
            c_b,
        }
    }

    fn search_params(restore_budget: u64) -> SearchParams {
        SearchParams::calibrate(
            ChecksumMethod::Md5,
            128,
            Budgets {
                repair: 0,
                restore: restore_budget,
            },
        )
    }

    fn policy() -> DistancePolicy {
        DistancePolicy {
            kind: crate::scoring::DistanceKind::Linear,
            penalty: 1,
            redundancy: 8,
        }
    }

    #[test]
    fn test_mode_targets() {
        use InstructionKind::*;
        assert!(RestoreMode::All.targets(NoHits));
        assert!(RestoreMode::All.targets(HitAmbiguous));
        assert!(RestoreMode::All.targets(Tamper));
        assert!(!RestoreMode::All.targets(Hit));
        assert!(!RestoreMode::All.targets(HitUnique));

        assert!(RestoreMode::AmbiNo.targets(NoHits));
        assert!(!RestoreMode::AmbiNo.targets(HitAmbiguous));

        assert!(RestoreMode::AmbiOnly.targets(HitAmbiguous));
        assert!(!RestoreMode::AmbiOnly.targets(NoHits));
    }

    #[test]
    fn test_mode_name_roundtrip() {
        for mode in [RestoreMode::All, RestoreMode::AmbiNo, RestoreMode::AmbiOnly] {
            assert_eq!(RestoreMode::parse(mode.name()), Some(mode));
        }
        assert_eq!(RestoreMode::parse("most"), None);
    }

    #[test]
    fn test_split_burst_reconstructed() {
        // Original z; data lost the first half of a burst, backup the
        // second half. Both sidecar digests still hold the digest of z.
        let method = ChecksumMethod::Md5;
        let z = vec![0x5Au8; 128];
        let c = method.compute(&z).to_vec();

        let mut x = z.clone();
        let mut y = z.clone();
        for bit in 136..140 {
            flip_bit(&mut x, bit);
        }
        for bit in 140..144 {
            flip_bit(&mut y, bit);
        }

        let records = restore_block(
            method,
            &search_params(10_000),
            &policy(),
            &item(x, c.clone(), y, c.clone()),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), Some(InstructionKind::HitUnique));
        assert_eq!(records[0].block, z);
        assert_eq!(records[0].digest, c);
    }

    #[test]
    fn test_identical_copies_with_decayed_digest() {
        // x == y but the stored digest drifted a bit: the single
        // computation confirms the block against the backup digest.
        let method = ChecksumMethod::Md5;
        let block = vec![0xC3u8; 128];
        let good = method.compute(&block).to_vec();
        let mut decayed = good.clone();
        decayed[0] ^= 0x01;

        let records = restore_block(
            method,
            &search_params(100),
            &policy(),
            &item(block.clone(), decayed, block.clone(), good),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), Some(InstructionKind::HitUnique));
        assert_eq!(records[0].block, block);
    }

    #[test]
    fn test_wide_divergence_accepts_exact_backup() {
        // Divergence beyond the width, but the backup matches the stored
        // digest exactly.
        let method = ChecksumMethod::Md5;
        let y = vec![0x77u8; 128];
        let c = method.compute(&y).to_vec();
        let x = vec![0x88u8; 128]; // far from y everywhere

        let records = restore_block(
            method,
            &search_params(100),
            &policy(),
            &item(x, c.clone(), y.clone(), c.clone()),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), Some(InstructionKind::HitUnique));
        assert_eq!(records[0].block, y);
    }

    #[test]
    fn test_wide_divergence_without_match_is_skipped() {
        let method = ChecksumMethod::Md5;
        let x = vec![0x11u8; 128];
        let y = vec![0xEEu8; 128];
        let c = method.compute(&[0u8; 128]).to_vec(); // matches neither

        let records = restore_block(
            method,
            &search_params(100),
            &policy(),
            &item(x, c.clone(), y, c),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn test_length_mismatches_classified() {
        let method = ChecksumMethod::Md5;
        let records = restore_block(
            method,
            &search_params(100),
            &policy(),
            &item(vec![0u8; 128], vec![0u8; 16], vec![0u8; 64], vec![0u8; 16]),
        );
        assert_eq!(
            records[0].kind(),
            Some(InstructionKind::BlockLengthMismatch)
        );

        let records = restore_block(
            method,
            &search_params(100),
            &policy(),
            &item(vec![0u8; 128], vec![0u8; 16], vec![0u8; 128], vec![0u8; 4]),
        );
        assert_eq!(
            records[0].kind(),
            Some(InstructionKind::ChecksumLengthMismatch)
        );
    }

    #[test]
    fn test_zero_budget_yields_nohits() {
        let method = ChecksumMethod::Md5;
        let z = vec![0x5Au8; 128];
        let c = method.compute(&z).to_vec();
        let mut x = z.clone();
        flip_bit(&mut x, 40);

        let records = restore_block(
            method,
            &search_params(0),
            &policy(),
            &item(x, c.clone(), z, c),
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), Some(InstructionKind::NoHits));
    }
}
