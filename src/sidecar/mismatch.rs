//! Verify mismatch records
//!
//! The error sidecar body is a dense sequence of these records, one per
//! mismatching block, in ascending block order. Record size is fixed per
//! sidecar (`8 + 2·K/8` bytes); the digest width is imported from the
//! header when reading.

use binrw::{BinRead, BinWrite};

/// One verify mismatch: a block whose stored and computed digests differ.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
#[br(import(digest_len: u32))]
pub struct MismatchRecord {
    pub block_index: u64,
    /// Digest stored in the checksum sidecar.
    #[br(count = digest_len)]
    pub given: Vec<u8>,
    /// Digest computed from the data block.
    #[br(count = digest_len)]
    pub computed: Vec<u8>,
}

impl MismatchRecord {
    /// One-line rendering for the human-readable twin file.
    pub fn describe(&self) -> String {
        format!(
            "block {} given {} computed {}",
            self.block_index,
            hex::encode(&self.given),
            hex::encode(&self.computed)
        )
    }
}
