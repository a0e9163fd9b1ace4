//! Binary sidecar files and their codecs
//!
//! Every sidecar (checksum, error, repair, restore) starts with the same
//! 32-byte self-redundant header followed by a dense record body. This
//! module holds the header codec, both record codecs, and the shared
//! read/write plumbing used by the pipelines.

mod header;
mod instruction;
mod mismatch;

pub use header::{HeaderError, RepairedField, SidecarHeader, HEADER_LEN};
pub use instruction::{InstructionKind, InstructionRecord};
pub use mismatch::MismatchRecord;

use crate::error::{Result, TaskError};
use binrw::{BinRead, BinWrite};
use log::warn;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn open_err(file: &Path) -> impl FnOnce(std::io::Error) -> TaskError + '_ {
    move |source| TaskError::Open {
        file: file.to_path_buf(),
        source,
    }
}

fn write_err(file: &Path) -> impl FnOnce(std::io::Error) -> TaskError + '_ {
    move |source| TaskError::Write {
        file: file.to_path_buf(),
        source,
    }
}

fn record_write_err(file: &Path, e: binrw::Error) -> TaskError {
    match e {
        binrw::Error::Io(source) => TaskError::Write {
            file: file.to_path_buf(),
            source,
        },
        other => TaskError::MalformedRecord {
            file: file.to_path_buf(),
            detail: other.to_string(),
        },
    }
}

fn warn_repairs(path: &Path, repaired: &[RepairedField]) {
    for field in repaired {
        warn!(
            "{}: header {} repaired from its twin copy",
            path.display(),
            field.name()
        );
    }
}

/// Read and reconcile the header of a sidecar file, logging any repaired
/// fields.
pub fn read_header(path: &Path) -> Result<(SidecarHeader, BufReader<File>)> {
    let file = File::open(path).map_err(open_err(path))?;
    let mut reader = BufReader::new(file);
    let (header, repaired) =
        SidecarHeader::read_from(&mut reader).map_err(|source| TaskError::Header {
            file: path.to_path_buf(),
            source,
        })?;
    warn_repairs(path, &repaired);
    Ok((header, reader))
}

/// Load an error sidecar: header plus all mismatch records.
pub fn read_mismatch_sidecar(path: &Path) -> Result<(SidecarHeader, Vec<MismatchRecord>)> {
    let len = std::fs::metadata(path).map_err(open_err(path))?.len();
    let (header, mut reader) = read_header(path)?;
    let digest_len = header.digest_bytes();
    let record_len = 8 + 2 * u64::from(digest_len);

    let mut records = Vec::new();
    let mut pos = HEADER_LEN as u64;
    while pos < len {
        let record = MismatchRecord::read_args(&mut reader, (digest_len,)).map_err(|e| {
            TaskError::MalformedRecord {
                file: path.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        records.push(record);
        pos += record_len;
    }
    Ok((header, records))
}

/// Load a repair or restore sidecar: header plus all instruction records.
pub fn read_instruction_sidecar(path: &Path) -> Result<(SidecarHeader, Vec<InstructionRecord>)> {
    let len = std::fs::metadata(path).map_err(open_err(path))?.len();
    let (header, mut reader) = read_header(path)?;
    let digest_len = header.digest_bytes();

    let mut records = Vec::new();
    let mut pos = HEADER_LEN as u64;
    while pos < len {
        let record = InstructionRecord::read_args(&mut reader, (digest_len,)).map_err(|e| {
            TaskError::MalformedRecord {
                file: path.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        pos += 40 + u64::from(digest_len) + record.block_len;
        records.push(record);
    }
    Ok((header, records))
}

/// A sidecar file opened for writing, header already emitted.
pub struct SidecarWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl SidecarWriter {
    pub fn create(path: &Path, header: &SidecarHeader) -> Result<Self> {
        let file = File::create(path).map_err(open_err(path))?;
        let mut writer = BufWriter::new(file);
        header.write_to(&mut writer).map_err(write_err(path))?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn write_mismatch(&mut self, record: &MismatchRecord) -> Result<()> {
        record
            .write(&mut self.writer)
            .map_err(|e| record_write_err(&self.path, e))
    }

    pub fn write_instruction(&mut self, record: &InstructionRecord) -> Result<()> {
        record
            .write(&mut self.writer)
            .map_err(|e| record_write_err(&self.path, e))
    }

    pub fn write_digest(&mut self, digest: &[u8]) -> Result<()> {
        self.writer.write_all(digest).map_err(write_err(&self.path))
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(write_err(&self.path))
    }
}

/// Human-readable twin of a binary sidecar: same base name plus `.txt`,
/// one line per record. Advisory only, never parsed back.
pub struct TwinWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl TwinWriter {
    pub fn create(sidecar_path: &Path) -> Result<Self> {
        let path = twin_path(sidecar_path);
        let file = File::create(&path).map_err(open_err(&path))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.writer, "{text}").map_err(write_err(&self.path))
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(write_err(&self.path))
    }
}

/// Path of the text twin for a binary sidecar.
pub fn twin_path(sidecar_path: &Path) -> PathBuf {
    let mut os = sidecar_path.as_os_str().to_os_string();
    os.push(".txt");
    PathBuf::from(os)
}
