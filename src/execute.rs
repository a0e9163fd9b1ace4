//! Apply instruction records to the data file
//!
//! Only `HIT!` and `HIT?` records mutate the file; everything else is
//! informational. Applying the same instruction file twice is a no-op the
//! second time: each record overwrites its block with the same bytes.

use crate::error::{Result, TaskError};
use crate::report::TaskSummary;
use crate::sidecar::{self, InstructionKind};
use log::{debug, info, warn};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

pub fn execute(data_path: &Path, instruction_path: &Path) -> Result<TaskSummary> {
    let (header, records) = sidecar::read_instruction_sidecar(instruction_path)?;
    let block_bytes = u64::from(header.block_bytes);

    let mut data = OpenOptions::new()
        .read(true)
        .write(true)
        .open(data_path)
        .map_err(|source| TaskError::Open {
            file: data_path.to_path_buf(),
            source,
        })?;

    let mut summary = TaskSummary::default();
    summary.total = records.len() as u64;

    for record in &records {
        let kind = record.kind();
        let applicable = kind.is_some_and(|k| k.is_applicable());
        if !applicable {
            debug!(
                "block {}: {} record is informational, not applied",
                record.block_index,
                kind.map(|k| k.tag_str()).unwrap_or("unknown")
            );
            continue;
        }

        let offset = record.block_index * block_bytes;
        if let Err(error) = data.seek(SeekFrom::Start(offset)) {
            warn!(
                "block {}: seek to offset {} failed ({error}); record skipped",
                record.block_index, offset
            );
            summary.failed += 1;
            continue;
        }
        if let Err(error) = data.write_all(&record.block) {
            warn!(
                "block {}: writing {} bytes failed ({error}); record skipped",
                record.block_index, record.block_len
            );
            summary.failed += 1;
            continue;
        }

        match kind {
            Some(InstructionKind::HitUnique) => summary.ok += 1,
            Some(InstructionKind::HitAmbiguous) => summary.ambiguous += 1,
            _ => unreachable!("only hit kinds are applicable"),
        }
    }

    data.flush().map_err(|source| TaskError::Write {
        file: data_path.to_path_buf(),
        source,
    })?;
    info!("{}: {}", data_path.display(), summary);
    Ok(summary)
}
