//! Progressive dithered repair search
//!
//! For each mismatched block, slide dither patterns of growing frame width
//! across the block and test every perturbed candidate against the stored
//! digest. Narrow frames run first and the search stops at the first width
//! that produces any hit: fewer flipped bits always beats more. The
//! brute-force budget is charged before every checksum computation, so a
//! capped block keeps whatever hits it has accumulated.

use crate::bits::{apply_pattern, bitdist, frames};
use crate::blockio::read_block_at;
use crate::checksum::ChecksumMethod;
use crate::config::{SearchOptions, SearchParams};
use crate::domain::Digest;
use crate::error::{Result, TaskError};
use crate::report::TaskSummary;
use crate::search::{Budget, Outcome};
use crate::sidecar::{self, InstructionKind, SidecarWriter, TwinWriter};
use log::{debug, info};
use rayon::prelude::*;
use std::fs::File;
use std::path::Path;

/// Run the repair search over every block in the mismatch sidecar and
/// write classified instruction records in ascending block order.
pub fn repair(
    options: &SearchOptions,
    data_path: &Path,
    error_path: &Path,
    repair_path: &Path,
) -> Result<TaskSummary> {
    let (header, mismatches) = sidecar::read_mismatch_sidecar(error_path)?;
    let config = options.for_header(&header);
    let params = config.calibrate();
    let policy = config.policy();
    debug!(
        "repair: method {} frame width {} tolerance {}",
        header.method, params.repair_width, params.tolerance
    );

    // Pull every damaged block into memory first so the search can run
    // CPU-parallel over purely in-memory data.
    let mut data = File::open(data_path).map_err(|source| TaskError::Open {
        file: data_path.to_path_buf(),
        source,
    })?;
    let mut work = Vec::with_capacity(mismatches.len());
    for mismatch in mismatches {
        let block = read_block_at(&mut data, data_path, mismatch.block_index, header.block_bytes)?;
        work.push((mismatch, block));
    }

    // Per-block searches are independent; collect preserves the ascending
    // input order the sidecar format requires.
    let results: Vec<_> = work
        .par_iter()
        .map(|(mismatch, block)| {
            let candidates = dithered_search(header.method, &params, block, &mismatch.given);
            Outcome::classify(candidates, block, &mismatch.given, &policy).into_records(
                mismatch.block_index,
                block,
                &mismatch.given,
            )
        })
        .collect();

    let mut writer = SidecarWriter::create(repair_path, &header)?;
    let mut twin = TwinWriter::create(repair_path)?;
    let mut summary = TaskSummary::default();
    for records in results {
        for record in records {
            twin.line(&record.describe())?;
            match record.kind() {
                Some(InstructionKind::HitUnique) => summary.record_ok(),
                Some(InstructionKind::HitAmbiguous) => summary.record_ambiguous(),
                Some(InstructionKind::NoHits) => summary.record_failed(),
                _ => {}
            }
            writer.write_instruction(&record)?;
        }
    }
    writer.finish()?;
    twin.finish()?;

    info!("{}: {}", repair_path.display(), summary);
    Ok(summary)
}

/// Dither a single block, returning every candidate whose digest lands
/// within tolerance of the stored one.
fn dithered_search(
    method: ChecksumMethod,
    params: &SearchParams,
    block: &[u8],
    given: &[u8],
) -> Vec<(Vec<u8>, Digest)> {
    let block_bits = block.len() * 8;
    let mut budget = Budget::new(params.budgets.repair);
    let mut found = Vec::new();
    let max_width = params.repair_width.min(block_bits as u32);

    for width in 0..=max_width {
        if width == 0 {
            // The unperturbed block: the stored digest itself may be the
            // damaged side.
            if !budget.charge(1) {
                return found;
            }
            let digest = method.compute(block);
            if bitdist(digest.as_bytes(), given) <= params.tolerance {
                found.push((block.to_vec(), digest));
            }
        } else {
            let mut candidate = block.to_vec();
            for pattern in frames(width) {
                for offset in 0..=(block_bits - width as usize) {
                    if !budget.charge(1) {
                        debug!("budget exhausted after {} operations", budget.used());
                        return found;
                    }
                    apply_pattern(&mut candidate, pattern, offset);
                    let digest = method.compute(&candidate);
                    if bitdist(digest.as_bytes(), given) <= params.tolerance {
                        found.push((candidate.clone(), digest));
                    }
                    apply_pattern(&mut candidate, pattern, offset);
                }
            }
        }
        // A productive width ends the search; wider dithers cannot beat
        // these candidates.
        if !found.is_empty() {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Budgets;

    fn options(repair_budget: u64) -> SearchOptions {
        SearchOptions {
            budgets: Budgets {
                repair: repair_budget,
                restore: 0,
            },
            ..SearchOptions::default()
        }
    }

    fn params(method: ChecksumMethod, block_bytes: u32, budget: u64) -> SearchParams {
        SearchParams::calibrate(
            method,
            block_bytes,
            Budgets {
                repair: budget,
                restore: 0,
            },
        )
    }

    #[test]
    fn test_single_flip_found_exactly() {
        let method = ChecksumMethod::Md5_32;
        let original = vec![0u8; 128];
        let given = method.compute(&original);

        let mut damaged = original.clone();
        damaged[7] ^= 1 << 3;

        let found = dithered_search(
            method,
            &params(method, 128, 10_000),
            &damaged,
            given.as_bytes(),
        );
        assert!(found.iter().any(|(block, digest)| {
            block == &original && digest.as_bytes() == given.as_bytes()
        }));
    }

    #[test]
    fn test_zero_budget_finds_nothing() {
        let method = ChecksumMethod::Md5_32;
        let block = vec![0xABu8; 128];
        let given = method.compute(&block);
        let found = dithered_search(method, &params(method, 128, 0), &block, given.as_bytes());
        assert!(found.is_empty());
    }

    #[test]
    fn test_intact_block_hits_at_width_zero() {
        // When the stored digest matches the block, the n = 0 round hits
        // and the search never dithers.
        let method = ChecksumMethod::Md5;
        let block = vec![0x33u8; 128];
        let given = method.compute(&block);
        let found = dithered_search(method, &params(method, 128, 10), &block, given.as_bytes());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, block);
    }

    #[test]
    fn test_repair_options_used() {
        // Smoke check that SearchOptions defaults thread through.
        let opts = options(100);
        assert_eq!(opts.budgets.repair, 100);
        assert_eq!(opts.penalty, 1);
    }
}
