//! Centralized checksum methods for block digests
//!
//! All digest computation goes through [`ChecksumMethod::compute`] to keep
//! behavior consistent between generate, verify and the search engines.
//! The method is chosen once per task and passed down by value; nothing in
//! this module keeps process-wide state.
//!
//! The truncated MD5 variants select fixed byte positions from the full
//! 16-byte MD5, producing 16/32/64-bit tags that trade collision resistance
//! for denser sidecars.

use crate::domain::Digest;
use md4::Md4;
use md5::{Digest as _, Md5};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Byte positions picked out of the full MD5 for the truncated variants.
const MD5_16_PICKS: [usize; 2] = [6, 13];
const MD5_32_PICKS: [usize; 4] = [2, 6, 10, 14];
const MD5_64_PICKS: [usize; 8] = [2, 3, 6, 9, 10, 12, 13, 15];

/// A checksum method: a name, a digest width, and a pure `compute` function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumMethod {
    Md4,
    Md5,
    Sha256,
    Crc32,
    Md5_16,
    Md5_32,
    Md5_64,
}

/// Error for unrecognized method names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown checksum method {0:?}")]
pub struct UnknownMethod(pub String);

impl ChecksumMethod {
    pub const ALL: [ChecksumMethod; 7] = [
        ChecksumMethod::Md4,
        ChecksumMethod::Md5,
        ChecksumMethod::Sha256,
        ChecksumMethod::Crc32,
        ChecksumMethod::Md5_16,
        ChecksumMethod::Md5_32,
        ChecksumMethod::Md5_64,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChecksumMethod::Md4 => "md4",
            ChecksumMethod::Md5 => "md5",
            ChecksumMethod::Sha256 => "sha256",
            ChecksumMethod::Crc32 => "crc32",
            ChecksumMethod::Md5_16 => "md5_16",
            ChecksumMethod::Md5_32 => "md5_32",
            ChecksumMethod::Md5_64 => "md5_64",
        }
    }

    /// Digest width in bits. A power of two for every method.
    pub fn digest_bits(&self) -> u32 {
        match self {
            ChecksumMethod::Md4 | ChecksumMethod::Md5 => 128,
            ChecksumMethod::Sha256 => 256,
            ChecksumMethod::Crc32 | ChecksumMethod::Md5_32 => 32,
            ChecksumMethod::Md5_16 => 16,
            ChecksumMethod::Md5_64 => 64,
        }
    }

    /// Digest width in bytes.
    pub fn digest_bytes(&self) -> u32 {
        self.digest_bits() / 8
    }

    /// Compute the digest of `data`. Deterministic and pure; cannot fail.
    pub fn compute(&self, data: &[u8]) -> Digest {
        match self {
            ChecksumMethod::Md4 => Digest::from_slice(Md4::digest(data).as_slice()),
            ChecksumMethod::Md5 => Digest::from_slice(Md5::digest(data).as_slice()),
            ChecksumMethod::Sha256 => Digest::from_slice(Sha256::digest(data).as_slice()),
            ChecksumMethod::Crc32 => {
                // 32-bit CRC packed little-endian as a 4-byte string.
                Digest::from_slice(&crc32fast::hash(data).to_le_bytes())
            }
            ChecksumMethod::Md5_16 => truncated_md5(data, &MD5_16_PICKS),
            ChecksumMethod::Md5_32 => truncated_md5(data, &MD5_32_PICKS),
            ChecksumMethod::Md5_64 => truncated_md5(data, &MD5_64_PICKS),
        }
    }
}

#[inline]
fn truncated_md5(data: &[u8], picks: &[usize]) -> Digest {
    let full: [u8; 16] = Md5::digest(data).into();
    picks.iter().map(|&i| full[i]).collect()
}

impl fmt::Display for ChecksumMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_widths() {
        for method in ChecksumMethod::ALL {
            let digest = method.compute(b"width probe");
            assert_eq!(digest.len() as u32, method.digest_bytes());
            assert!(method.digest_bits().is_power_of_two());
        }
    }

    #[test]
    fn test_compute_deterministic() {
        for method in ChecksumMethod::ALL {
            let a = method.compute(b"same input");
            let b = method.compute(b"same input");
            assert_eq!(a, b, "{} should be deterministic", method);
        }
    }

    #[test]
    fn test_md5_known_vector() {
        // MD5 of empty string is d41d8cd98f00b204e9800998ecf8427e
        let digest = ChecksumMethod::Md5.compute(b"");
        assert_eq!(
            digest.as_bytes(),
            &[
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec,
                0xf8, 0x42, 0x7e,
            ]
        );
    }

    #[test]
    fn test_truncated_variants_select_from_full_md5() {
        let data = b"truncation probe";
        let full = ChecksumMethod::Md5.compute(data);
        let full = full.as_bytes();

        let t16 = ChecksumMethod::Md5_16.compute(data);
        assert_eq!(t16.as_bytes(), &[full[6], full[13]]);

        let t32 = ChecksumMethod::Md5_32.compute(data);
        assert_eq!(t32.as_bytes(), &[full[2], full[6], full[10], full[14]]);

        let t64 = ChecksumMethod::Md5_64.compute(data);
        assert_eq!(
            t64.as_bytes(),
            &[full[2], full[3], full[6], full[9], full[10], full[12], full[13], full[15]]
        );
    }

    #[test]
    fn test_crc32_little_endian_packing() {
        let data = b"crc packing";
        let expected = crc32fast::hash(data).to_le_bytes();
        assert_eq!(ChecksumMethod::Crc32.compute(data).as_bytes(), &expected);
    }

    #[test]
    fn test_name_roundtrip() {
        for method in ChecksumMethod::ALL {
            assert_eq!(method.name().parse::<ChecksumMethod>().unwrap(), method);
        }
        assert!("md6".parse::<ChecksumMethod>().is_err());
    }
}
