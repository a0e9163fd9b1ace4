//! Error types for bitmend tasks

use crate::sidecar::HeaderError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Failed to open a file
    #[error("failed to open {file}: {source}")]
    Open {
        file: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read from a file
    #[error("failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write to a file
    #[error("failed to write {file}: {source}")]
    Write {
        file: PathBuf,
        source: std::io::Error,
    },

    /// Failed to seek in a file
    #[error("failed to seek to offset {offset} in {file}: {source}")]
    Seek {
        file: PathBuf,
        offset: u64,
        source: std::io::Error,
    },

    /// Sidecar header could not be reconciled
    #[error("unresolvable sidecar header in {file}: {source}")]
    Header {
        file: PathBuf,
        source: HeaderError,
    },

    /// Redundancy would break the power-of-two block invariant
    #[error("redundancy {0} is not a power of two")]
    BadRedundancy(u32),

    /// Checksum sidecar and data file disagree about the block count
    #[error("checksum sidecar {file} holds {got} digests but the data file has {want} blocks")]
    DigestCountMismatch { file: PathBuf, got: u64, want: u64 },

    /// A sidecar record could not be decoded
    #[error("malformed record in {file}: {detail}")]
    MalformedRecord { file: PathBuf, detail: String },

    /// I/O error occurred (catch-all for other I/O errors)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with TaskError
pub type Result<T> = std::result::Result<T, TaskError>;
