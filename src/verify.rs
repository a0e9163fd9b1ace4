//! Block verification against a checksum sidecar
//!
//! Walks the data file and the checksum sidecar in parallel streams and
//! records every block whose computed digest differs from the stored one.
//! The mismatch list is the work order for the repair engine. Verify never
//! modifies data.

use crate::blockio::{block_count, BlockReader};
use crate::error::{Result, TaskError};
use crate::report::TaskSummary;
use crate::sidecar::{self, MismatchRecord, SidecarWriter, TwinWriter, HEADER_LEN};
use log::{debug, info};
use std::io::Read;
use std::path::Path;

pub fn verify(data_path: &Path, checksum_path: &Path, error_path: &Path) -> Result<TaskSummary> {
    let (header, mut digests) = sidecar::read_header(checksum_path)?;
    let digest_len = header.digest_bytes();

    let data_len = std::fs::metadata(data_path)
        .map_err(|source| TaskError::Open {
            file: data_path.to_path_buf(),
            source,
        })?
        .len();
    let sidecar_len = std::fs::metadata(checksum_path)
        .map_err(|source| TaskError::Open {
            file: checksum_path.to_path_buf(),
            source,
        })?
        .len();

    let want = block_count(data_len, header.block_bytes);
    let got = (sidecar_len - HEADER_LEN as u64) / u64::from(digest_len);
    if got != want {
        return Err(TaskError::DigestCountMismatch {
            file: checksum_path.to_path_buf(),
            got,
            want,
        });
    }

    let mut writer = SidecarWriter::create(error_path, &header)?;
    let mut twin = TwinWriter::create(error_path)?;
    let mut summary = TaskSummary::default();
    let mut given = vec![0u8; digest_len as usize];

    for (index, block) in BlockReader::open(data_path, header.block_bytes as usize)?.enumerate() {
        let block = block?;
        digests
            .read_exact(&mut given)
            .map_err(|source| TaskError::Read {
                file: checksum_path.to_path_buf(),
                source,
            })?;

        let computed = header.method.compute(&block);
        if computed.as_bytes() == given.as_slice() {
            summary.record_ok();
        } else {
            let record = MismatchRecord {
                block_index: index as u64,
                given: given.clone(),
                computed: computed.to_vec(),
            };
            debug!("mismatch at {}", record.describe());
            twin.line(&record.describe())?;
            writer.write_mismatch(&record)?;
            summary.record_failed();
        }
    }

    writer.finish()?;
    twin.finish()?;
    info!("{}: {}", data_path.display(), summary);
    Ok(summary)
}
