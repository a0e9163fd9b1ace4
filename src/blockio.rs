//! Fixed-size block reading for data and backup files

use crate::error::{Result, TaskError};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const BUFFER_SIZE: usize = 1024 * 1024; // 1MB read buffer

/// Number of blocks a file of `file_len` bytes partitions into.
pub(crate) fn block_count(file_len: u64, block_bytes: u32) -> u64 {
    file_len.div_ceil(u64::from(block_bytes))
}

/// Iterator over the fixed-size blocks of a file; the final block may be
/// short.
pub(crate) struct BlockReader {
    reader: BufReader<File>,
    block_bytes: usize,
    buffer: Vec<u8>,
    path: PathBuf,
}

impl BlockReader {
    pub(crate) fn open(path: &Path, block_bytes: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| TaskError::Open {
            file: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, file),
            block_bytes,
            buffer: vec![0u8; block_bytes],
            path: path.to_path_buf(),
        })
    }

    fn read_block(&mut self) -> Result<Option<Vec<u8>>> {
        let mut filled = 0;
        while filled < self.block_bytes {
            let n = self
                .reader
                .read(&mut self.buffer[filled..])
                .map_err(|source| TaskError::Read {
                    file: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            Ok(None)
        } else {
            Ok(Some(self.buffer[..filled].to_vec()))
        }
    }
}

impl Iterator for BlockReader {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_block().transpose()
    }
}

/// Read block `index` of an open file; short at EOF, empty past it.
pub(crate) fn read_block_at(
    file: &mut File,
    path: &Path,
    index: u64,
    block_bytes: u32,
) -> Result<Vec<u8>> {
    let offset = index * u64::from(block_bytes);
    file.seek(SeekFrom::Start(offset))
        .map_err(|source| TaskError::Seek {
            file: path.to_path_buf(),
            offset,
            source,
        })?;
    let mut block = vec![0u8; block_bytes as usize];
    let mut filled = 0;
    while filled < block.len() {
        let n = file
            .read(&mut block[filled..])
            .map_err(|source| TaskError::Read {
                file: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    block.truncate(filled);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_block_count() {
        assert_eq!(block_count(0, 128), 0);
        assert_eq!(block_count(1, 128), 1);
        assert_eq!(block_count(128, 128), 1);
        assert_eq!(block_count(129, 128), 2);
        assert_eq!(block_count(3000, 128), 24);
    }

    #[test]
    fn test_reader_yields_short_final_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&[0x42u8; 300])
            .unwrap();

        let blocks: Vec<Vec<u8>> = BlockReader::open(&path, 128)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].len(), 128);
        assert_eq!(blocks[2].len(), 44);
    }

    #[test]
    fn test_read_block_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let bytes: Vec<u8> = (0..=255u8).collect();
        std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();

        let mut file = File::open(&path).unwrap();
        let block = read_block_at(&mut file, &path, 1, 100).unwrap();
        assert_eq!(block, (100..200).map(|b| b as u8).collect::<Vec<_>>());
        let tail = read_block_at(&mut file, &path, 2, 100).unwrap();
        assert_eq!(tail.len(), 56);
        let past = read_block_at(&mut file, &path, 9, 100).unwrap();
        assert!(past.is_empty());
    }
}
