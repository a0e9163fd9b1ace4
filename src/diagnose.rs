//! Side-by-side damage report for test harnesses
//!
//! Given the full set of artifacts from an experiment run (the original
//! file, the corrupted copy, the backup, the current data file, and both
//! instruction sidecars), write a comparison section for every block whose
//! final instruction disagrees with the original. Restore instructions
//! take precedence over repair instructions for a block.

use crate::bits::bitdist;
use crate::blockio::read_block_at;
use crate::error::{Result, TaskError};
use crate::report::TaskSummary;
use crate::sidecar::{self, InstructionKind, InstructionRecord};
use log::info;
use rustc_hash::FxHashMap as HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Everything the diagnosis needs to see at once.
#[derive(Debug, Clone)]
pub struct DiagnosePaths {
    /// Data file after execute.
    pub data: PathBuf,
    /// Known-good original.
    pub original: PathBuf,
    /// Backup copy.
    pub backup: PathBuf,
    /// Pre-repair corrupted copy.
    pub corrupt: PathBuf,
    /// Repair instruction sidecar.
    pub repair: PathBuf,
    /// Restore instruction sidecar.
    pub restore: PathBuf,
    /// Report output.
    pub report: PathBuf,
}

/// Final (summary) instruction per block of one stage.
fn summary_records(records: Vec<InstructionRecord>) -> HashMap<u64, InstructionRecord> {
    let mut map = HashMap::default();
    for record in records {
        if record.kind() != Some(InstructionKind::Hit) {
            map.insert(record.block_index, record);
        }
    }
    map
}

pub fn diagnose(paths: &DiagnosePaths) -> Result<TaskSummary> {
    let (header, repair_records) = sidecar::read_instruction_sidecar(&paths.repair)?;
    let (_, restore_records) = sidecar::read_instruction_sidecar(&paths.restore)?;
    let repair_map = summary_records(repair_records);
    let restore_map = summary_records(restore_records);

    let mut indices: Vec<u64> = repair_map.keys().chain(restore_map.keys()).copied().collect();
    indices.sort_unstable();
    indices.dedup();

    let open = |path: &Path| {
        File::open(path).map_err(|source| TaskError::Open {
            file: path.to_path_buf(),
            source,
        })
    };
    let mut original = open(&paths.original)?;
    let mut corrupt = open(&paths.corrupt)?;
    let mut backup = open(&paths.backup)?;
    let mut data = open(&paths.data)?;

    let report = File::create(&paths.report).map_err(|source| TaskError::Open {
        file: paths.report.to_path_buf(),
        source,
    })?;
    let mut out = BufWriter::new(report);
    let write_err = |source| TaskError::Write {
        file: paths.report.to_path_buf(),
        source,
    };

    let mut summary = TaskSummary::default();
    for index in indices {
        let repair_final = repair_map.get(&index);
        let restore_final = restore_map.get(&index);
        let final_record = restore_final
            .or(repair_final)
            .expect("index came from one of the maps");

        let original_block = read_block_at(&mut original, &paths.original, index, header.block_bytes)?;
        if final_record.block == original_block {
            match final_record.kind() {
                Some(InstructionKind::HitAmbiguous) => summary.record_ambiguous(),
                _ => summary.record_ok(),
            }
            continue;
        }
        summary.record_failed();

        let corrupt_block = read_block_at(&mut corrupt, &paths.corrupt, index, header.block_bytes)?;
        let backup_block = read_block_at(&mut backup, &paths.backup, index, header.block_bytes)?;
        let data_block = read_block_at(&mut data, &paths.data, index, header.block_bytes)?;
        // A stage that produced no record left the block as it found it.
        let repair_block = repair_final
            .map(|r| r.block.as_slice())
            .unwrap_or(&corrupt_block);
        let restore_block = restore_final
            .map(|r| r.block.as_slice())
            .unwrap_or(repair_block);

        writeln!(out, "block {index}: differs from original").map_err(write_err)?;
        for (label, record) in [("repair", repair_final), ("restore", restore_final)] {
            match record {
                Some(r) => writeln!(
                    out,
                    "  {label}: {} dist {} ambival {}",
                    r.kind().map(|k| k.tag_str()).unwrap_or("UNKNOWN"),
                    r.distance,
                    r.ambival
                )
                .map_err(write_err)?,
                None => writeln!(out, "  {label}: (no record)").map_err(write_err)?,
            }
        }
        for (label, a, b) in [
            ("original<->corrupt", original_block.as_slice(), corrupt_block.as_slice()),
            ("corrupt<->repair", corrupt_block.as_slice(), repair_block),
            ("repair<->restore", repair_block, restore_block),
            ("original<->data", original_block.as_slice(), data_block.as_slice()),
            ("original<->backup", original_block.as_slice(), backup_block.as_slice()),
        ] {
            write_comparison(&mut out, label, a, b, &header).map_err(write_err)?;
        }
        writeln!(out).map_err(write_err)?;
    }

    writeln!(out, "summary: {summary}").map_err(write_err)?;
    out.flush().map_err(write_err)?;
    info!("{}: {}", paths.report.display(), summary);
    Ok(summary)
}

fn write_comparison(
    out: &mut impl Write,
    label: &str,
    a: &[u8],
    b: &[u8],
    header: &sidecar::SidecarHeader,
) -> std::io::Result<()> {
    let digest_a = header.method.compute(a);
    let digest_b = header.method.compute(b);
    let digest_dist = bitdist(digest_a.as_bytes(), digest_b.as_bytes());
    if a.len() == b.len() {
        writeln!(
            out,
            "  {label}: block {} bits, digest {} bits",
            bitdist(a, b),
            digest_dist
        )
    } else {
        writeln!(
            out,
            "  {label}: lengths {} vs {} bytes, digest {} bits",
            a.len(),
            b.len(),
            digest_dist
        )
    }
}
