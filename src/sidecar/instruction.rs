//! Repair and restore instruction records
//!
//! Each record is a fixed 40-byte head followed by a digest and the
//! candidate block. The head carries an 8-byte ASCII kind tag; the two
//! variable-length fields come last so their sizes are discoverable from
//! `block_len` and the header's digest width.

use binrw::{BinRead, BinWrite};

/// Classification of an instruction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    /// One of several candidates for a block.
    Hit,
    /// Summary of an ambiguous block: the minimum-distance candidate.
    HitAmbiguous,
    /// The unique candidate for a block.
    HitUnique,
    /// The search found no candidate; the record carries the damaged
    /// block unchanged.
    NoHits,
    /// Data and backup block lengths disagree.
    BlockLengthMismatch,
    /// Data and backup digest lengths disagree.
    ChecksumLengthMismatch,
    /// Reserved for downstream tamper analysis; never emitted here.
    Tamper,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 7] = [
        InstructionKind::Hit,
        InstructionKind::HitAmbiguous,
        InstructionKind::HitUnique,
        InstructionKind::NoHits,
        InstructionKind::BlockLengthMismatch,
        InstructionKind::ChecksumLengthMismatch,
        InstructionKind::Tamper,
    ];

    pub fn tag_str(&self) -> &'static str {
        match self {
            InstructionKind::Hit => "HIT",
            InstructionKind::HitAmbiguous => "HIT?",
            InstructionKind::HitUnique => "HIT!",
            InstructionKind::NoHits => "NOHITS",
            InstructionKind::BlockLengthMismatch => "BLENGTH?",
            InstructionKind::ChecksumLengthMismatch => "CLENGTH?",
            InstructionKind::Tamper => "TAMPER?",
        }
    }

    /// The 8-byte null-padded wire tag.
    pub fn tag(&self) -> [u8; 8] {
        let mut tag = [0u8; 8];
        let bytes = self.tag_str().as_bytes();
        tag[..bytes.len()].copy_from_slice(bytes);
        tag
    }

    /// Parse a wire tag. Accepts the historical `TAMPER` spelling without
    /// the question mark.
    pub fn from_tag(tag: &[u8; 8]) -> Option<InstructionKind> {
        let end = tag.iter().position(|&b| b == 0).unwrap_or(tag.len());
        match &tag[..end] {
            b"HIT" => Some(InstructionKind::Hit),
            b"HIT?" => Some(InstructionKind::HitAmbiguous),
            b"HIT!" => Some(InstructionKind::HitUnique),
            b"NOHITS" => Some(InstructionKind::NoHits),
            b"BLENGTH?" => Some(InstructionKind::BlockLengthMismatch),
            b"CLENGTH?" => Some(InstructionKind::ChecksumLengthMismatch),
            b"TAMPER?" | b"TAMPER" => Some(InstructionKind::Tamper),
            _ => None,
        }
    }

    /// Whether execute applies records of this kind to the data file.
    pub fn is_applicable(&self) -> bool {
        matches!(
            self,
            InstructionKind::HitUnique | InstructionKind::HitAmbiguous
        )
    }
}

/// One instruction record as stored in a repair or restore sidecar.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
#[br(import(digest_len: u32))]
pub struct InstructionRecord {
    pub kind_tag: [u8; 8],
    pub block_index: u64,
    pub block_len: u64,
    pub distance: u64,
    pub ambival: u64,
    #[br(count = digest_len)]
    pub digest: Vec<u8>,
    #[br(count = block_len)]
    pub block: Vec<u8>,
}

impl InstructionRecord {
    pub fn new(
        kind: InstructionKind,
        block_index: u64,
        distance: u64,
        ambival: u64,
        digest: Vec<u8>,
        block: Vec<u8>,
    ) -> Self {
        Self {
            kind_tag: kind.tag(),
            block_index,
            block_len: block.len() as u64,
            distance,
            ambival,
            digest,
            block,
        }
    }

    /// Decoded kind, if the tag is recognized.
    pub fn kind(&self) -> Option<InstructionKind> {
        InstructionKind::from_tag(&self.kind_tag)
    }

    /// One-line rendering for the human-readable twin file.
    pub fn describe(&self) -> String {
        let kind = self
            .kind()
            .map(|k| k.tag_str())
            .unwrap_or("UNKNOWN");
        format!(
            "{:<8} block {} len {} dist {} ambival {} digest {} block {}",
            kind,
            self.block_index,
            self.block_len,
            self.distance,
            self.ambival,
            hex::encode(&self.digest),
            hex::encode(&self.block)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinWrite as _;
    use std::io::Cursor;

    #[test]
    fn test_tag_roundtrip() {
        for kind in InstructionKind::ALL {
            assert_eq!(InstructionKind::from_tag(&kind.tag()), Some(kind));
        }
    }

    #[test]
    fn test_legacy_tamper_spelling() {
        let mut tag = [0u8; 8];
        tag[..6].copy_from_slice(b"TAMPER");
        assert_eq!(InstructionKind::from_tag(&tag), Some(InstructionKind::Tamper));
    }

    #[test]
    fn test_unknown_tag() {
        let mut tag = [0u8; 8];
        tag[..4].copy_from_slice(b"MISS");
        assert_eq!(InstructionKind::from_tag(&tag), None);
    }

    #[test]
    fn test_record_roundtrip() {
        let record = InstructionRecord::new(
            InstructionKind::HitUnique,
            3,
            17,
            0,
            vec![0xAB; 4],
            vec![0x55; 128],
        );

        let mut buf = Cursor::new(Vec::new());
        record.write(&mut buf).unwrap();
        // 40-byte head + digest + block
        assert_eq!(buf.get_ref().len(), 40 + 4 + 128);
        assert_eq!(&buf.get_ref()[..8], b"HIT!\0\0\0\0");

        buf.set_position(0);
        let read = InstructionRecord::read_args(&mut buf, (4,)).unwrap();
        assert_eq!(read, record);
        assert_eq!(read.kind(), Some(InstructionKind::HitUnique));
    }

    #[test]
    fn test_only_hit_kinds_apply() {
        for kind in InstructionKind::ALL {
            let applies = matches!(
                kind,
                InstructionKind::HitUnique | InstructionKind::HitAmbiguous
            );
            assert_eq!(kind.is_applicable(), applies);
        }
    }
}
