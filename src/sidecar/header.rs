//! Self-redundant sidecar header
//!
//! Every non-data sidecar starts with the same 32-byte header. Each
//! logical field is stored twice so that any single-field corruption can
//! be repaired on read:
//!
//! ```text
//! Offset  Size  Field
//!    0      8   method_name_A    ASCII, null-padded
//!    8      8   method_name_B    duplicate of A
//!   16      4   checksum_bits_A  LE u32
//!   20      4   checksum_bits_B  duplicate of A
//!   24      4   block_bytes_A    LE u32
//!   28      4   block_bytes_B    duplicate of A
//! ```
//!
//! Numeric fields are reconciled by preferring the copy that is a power of
//! two; the method name by whichever copy resolves to a known method.
//! Fixed-width duplication is the point: a length-prefixed container would
//! itself be one bit flip away from garbage.

use crate::checksum::ChecksumMethod;
use std::io::{Read, Write};
use thiserror::Error;

pub const HEADER_LEN: usize = 32;

/// Resolved header fields of a sidecar file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidecarHeader {
    pub method: ChecksumMethod,
    /// Digest width `K` in bits.
    pub checksum_bits: u32,
    /// Block size `B` in bytes.
    pub block_bytes: u32,
}

/// A header field whose corrupted copy was overridden by its twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairedField {
    MethodName,
    ChecksumBits,
    BlockBytes,
}

impl RepairedField {
    pub fn name(&self) -> &'static str {
        match self {
            RepairedField::MethodName => "method name",
            RepairedField::ChecksumBits => "checksum bits",
            RepairedField::BlockBytes => "block bytes",
        }
    }
}

/// Why a header could not be reconciled.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("unknown checksum method {0:?}")]
    UnknownMethod(String),

    #[error("method name copies resolve to different methods ({a} / {b})")]
    MethodConflict { a: ChecksumMethod, b: ChecksumMethod },

    #[error("neither method name copy resolves ({a:?} / {b:?})")]
    MethodUnresolvable { a: String, b: String },

    #[error("{field} copies {a} and {b} cannot be reconciled")]
    NumericUnresolvable { field: &'static str, a: u32, b: u32 },

    #[error("checksum width {bits} does not match method {method} ({expected} bits)")]
    WidthMismatch {
        method: ChecksumMethod,
        bits: u32,
        expected: u32,
    },

    #[error("block size {block_bytes} is not a multiple of the {digest_bytes}-byte digest")]
    BadBlockSize { block_bytes: u32, digest_bytes: u32 },

    #[error("sidecar truncated: {0}")]
    Io(#[from] std::io::Error),
}

impl SidecarHeader {
    pub fn new(method: ChecksumMethod, block_bytes: u32) -> Self {
        Self {
            method,
            checksum_bits: method.digest_bits(),
            block_bytes,
        }
    }

    /// Digest width in bytes.
    pub fn digest_bytes(&self) -> u32 {
        self.checksum_bits / 8
    }

    /// Redundancy factor `R` = block bytes / digest bytes.
    pub fn redundancy(&self) -> u32 {
        self.block_bytes / self.digest_bytes()
    }

    /// Serialize to the fixed 32-byte layout, each field twice.
    pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        let mut name = [0u8; 8];
        let bytes = self.method.name().as_bytes();
        name[..bytes.len()].copy_from_slice(bytes);

        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&name);
        buf[8..16].copy_from_slice(&name);
        buf[16..20].copy_from_slice(&self.checksum_bits.to_le_bytes());
        buf[20..24].copy_from_slice(&self.checksum_bits.to_le_bytes());
        buf[24..28].copy_from_slice(&self.block_bytes.to_le_bytes());
        buf[28..32].copy_from_slice(&self.block_bytes.to_le_bytes());
        writer.write_all(&buf)
    }

    /// Read and reconcile a header, listing any fields that had to be
    /// repaired from their twin copy.
    pub fn read_from<R: Read>(mut reader: R) -> Result<(Self, Vec<RepairedField>), HeaderError> {
        let mut buf = [0u8; HEADER_LEN];
        reader.read_exact(&mut buf)?;

        let mut repaired = Vec::new();

        let method = resolve_method(&buf[0..8], &buf[8..16], &mut repaired)?;
        let checksum_bits = resolve_pow2(
            RepairedField::ChecksumBits,
            le_u32(&buf[16..20]),
            le_u32(&buf[20..24]),
            &mut repaired,
        )?;
        let block_bytes = resolve_pow2(
            RepairedField::BlockBytes,
            le_u32(&buf[24..28]),
            le_u32(&buf[28..32]),
            &mut repaired,
        )?;

        if checksum_bits != method.digest_bits() {
            return Err(HeaderError::WidthMismatch {
                method,
                bits: checksum_bits,
                expected: method.digest_bits(),
            });
        }
        let digest_bytes = checksum_bits / 8;
        if block_bytes % digest_bytes != 0 {
            return Err(HeaderError::BadBlockSize {
                block_bytes,
                digest_bytes,
            });
        }

        Ok((
            Self {
                method,
                checksum_bits,
                block_bytes,
            },
            repaired,
        ))
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes.try_into().expect("4-byte field"))
}

fn parse_name(raw: &[u8]) -> Option<ChecksumMethod> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end]).ok()?.parse().ok()
}

fn resolve_method(
    a: &[u8],
    b: &[u8],
    repaired: &mut Vec<RepairedField>,
) -> Result<ChecksumMethod, HeaderError> {
    let lossy = |raw: &[u8]| String::from_utf8_lossy(raw).into_owned();
    if a == b {
        return parse_name(a).ok_or_else(|| HeaderError::UnknownMethod(lossy(a)));
    }
    match (parse_name(a), parse_name(b)) {
        (Some(m), None) | (None, Some(m)) => {
            repaired.push(RepairedField::MethodName);
            Ok(m)
        }
        (Some(a), Some(b)) => Err(HeaderError::MethodConflict { a, b }),
        (None, None) => Err(HeaderError::MethodUnresolvable {
            a: lossy(a),
            b: lossy(b),
        }),
    }
}

fn resolve_pow2(
    field: RepairedField,
    a: u32,
    b: u32,
    repaired: &mut Vec<RepairedField>,
) -> Result<u32, HeaderError> {
    if a == b {
        if a.is_power_of_two() {
            return Ok(a);
        }
        return Err(HeaderError::NumericUnresolvable {
            field: field.name(),
            a,
            b,
        });
    }
    match (a.is_power_of_two(), b.is_power_of_two()) {
        (true, false) => {
            repaired.push(field);
            Ok(a)
        }
        (false, true) => {
            repaired.push(field);
            Ok(b)
        }
        _ => Err(HeaderError::NumericUnresolvable {
            field: field.name(),
            a,
            b,
        }),
    }
}
