//! Core domain types for block-preservation operations
//!
//! Type-safe wrappers shared across the codebase. Digests vary in width
//! between checksum methods (2 to 32 bytes), so `Digest` wraps a small
//! inline vector rather than a fixed array.

use smallvec::SmallVec;
use std::fmt;

/// A computed or stored block digest.
///
/// Width depends on the checksum method (between 2 and 32 bytes); all
/// supported widths fit inline without heap allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest(SmallVec<[u8; 32]>);

impl Digest {
    pub fn from_slice(bytes: &[u8]) -> Self {
        Digest(SmallVec::from_slice(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<&[u8]> for Digest {
    fn from(bytes: &[u8]) -> Self {
        Digest::from_slice(bytes)
    }
}

impl FromIterator<u8> for Digest {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Digest(iter.into_iter().collect())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq<[u8]> for Digest {
    fn eq(&self, other: &[u8]) -> bool {
        self.0.as_slice() == other
    }
}

impl PartialEq<Digest> for [u8] {
    fn eq(&self, other: &Digest) -> bool {
        self == other.0.as_slice()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0.as_slice()))
    }
}
