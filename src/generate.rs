//! Checksum sidecar generation
//!
//! Streams the data file in fixed-size blocks and writes one digest per
//! block after the self-redundant header. Deterministic: identical input
//! yields a bit-identical sidecar.

use crate::blockio::BlockReader;
use crate::config::TaskConfig;
use crate::error::Result;
use crate::report::TaskSummary;
use crate::sidecar::{SidecarHeader, SidecarWriter};
use log::info;
use std::path::Path;

pub fn generate(config: &TaskConfig, data_path: &Path, checksum_path: &Path) -> Result<TaskSummary> {
    config.validate()?;
    let block_bytes = config.block_bytes();
    let header = SidecarHeader::new(config.method, block_bytes);

    let mut writer = SidecarWriter::create(checksum_path, &header)?;
    let mut summary = TaskSummary::default();
    for block in BlockReader::open(data_path, block_bytes as usize)? {
        let block = block?;
        let digest = config.method.compute(&block);
        writer.write_digest(digest.as_bytes())?;
        summary.record_ok();
    }
    writer.finish()?;

    info!(
        "{}: wrote {} {} digests ({} bytes per block)",
        checksum_path.display(),
        summary.total,
        config.method,
        block_bytes
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::ChecksumMethod;
    use std::io::Write;

    #[test]
    fn test_sidecar_size() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("data");
        let checksum_path = dir.path().join("data.chk");
        let bytes: Vec<u8> = (0..3000u32).map(|i| (i & 0xFF) as u8).collect();
        std::fs::File::create(&data_path)
            .unwrap()
            .write_all(&bytes)
            .unwrap();

        let config = TaskConfig::new(ChecksumMethod::Md5_32, 32);
        let summary = generate(&config, &data_path, &checksum_path).unwrap();

        // 3000 bytes in 128-byte blocks: 24 digests of 4 bytes each.
        assert_eq!(summary.total, 24);
        assert_eq!(std::fs::metadata(&checksum_path).unwrap().len(), 32 + 96);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("data");
        std::fs::File::create(&data_path)
            .unwrap()
            .write_all(&[0x5Au8; 700])
            .unwrap();

        let config = TaskConfig::new(ChecksumMethod::Md5_64, 16);
        let first = dir.path().join("a.chk");
        let second = dir.path().join("b.chk");
        generate(&config, &data_path, &first).unwrap();
        generate(&config, &data_path, &second).unwrap();

        assert_eq!(
            std::fs::read(&first).unwrap(),
            std::fs::read(&second).unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_redundancy() {
        let dir = tempfile::tempdir().unwrap();
        let config = TaskConfig::new(ChecksumMethod::Md5, 12);
        assert!(generate(&config, &dir.path().join("x"), &dir.path().join("y")).is_err());
    }
}
