//! Pack-stream decoding and object reconstruction.
//!
//! A fetch response carries a *pack*: a framed binary stream of zlib-deflated
//! object records, some stored whole and some as deltas against an earlier
//! record (`ofs-delta`) or an object known by id (`ref-delta`). This crate
//! decodes the stream into an [`ObjectStore`], then resolves every delta
//! chain so that each record's full content and identity are available.

pub mod decode;
pub mod delta;
pub mod record;
pub mod store;

use gitup_hash::ObjectId;
use gitup_object::ObjectKind;

pub use record::{encode_ofs_offset, encode_record_header};
pub use store::{ObjectStore, PackRecord};

/// Errors that can occur while decoding a pack or applying deltas.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("pack checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: ObjectId, actual: ObjectId },

    #[error("corrupt pack record at offset {0}")]
    CorruptRecord(u64),

    #[error("zlib inflation failed at offset {offset}: {source}")]
    Inflate {
        offset: u64,
        source: std::io::Error,
    },

    #[error("inflated size mismatch at offset {offset}: header says {expected}, got {actual}")]
    InflatedSizeMismatch {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("ofs-delta at offset {offset} references no earlier record")]
    UnresolvedOfsDelta { offset: u64 },

    #[error("ref-delta base not found: {0}")]
    UnresolvedRefDelta(ObjectId),

    #[error("truncated delta stream at position {position}: {reason}")]
    TruncatedDelta {
        position: usize,
        reason: &'static str,
    },

    #[error("reserved delta opcode 0 at position {position}")]
    ReservedOpcode { position: usize },

    #[error("delta base size mismatch: delta says {expected}, base is {actual}")]
    BaseSizeMismatch { expected: usize, actual: usize },

    #[error("delta copy out of bounds: offset={offset}, len={len}, base_len={base_len}")]
    CopyOutOfBounds {
        offset: usize,
        len: usize,
        base_len: usize,
    },

    #[error("delta output overflow: {produced} bytes produced, target size is {limit}")]
    DeltaOverflow { produced: usize, limit: usize },

    #[error("delta size mismatch: target size is {expected}, got {actual}")]
    DeltaSizeMismatch { expected: usize, actual: usize },
}

/// The kind of a decoded pack record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Commit,
    Tree,
    Blob,
    Tag,
    /// Delta whose base is an earlier record in the same pack, located by
    /// its pack-order index.
    OfsDelta { base_index: usize },
    /// Delta whose base is located by content identity.
    RefDelta { base_oid: ObjectId },
}

impl RecordKind {
    /// Convert a non-delta record kind to its terminal [`ObjectKind`].
    pub fn to_object_kind(self) -> Option<ObjectKind> {
        match self {
            Self::Commit => Some(ObjectKind::Commit),
            Self::Tree => Some(ObjectKind::Tree),
            Self::Blob => Some(ObjectKind::Blob),
            Self::Tag => Some(ObjectKind::Tag),
            Self::OfsDelta { .. } | Self::RefDelta { .. } => None,
        }
    }

    pub fn from_object_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Commit => Self::Commit,
            ObjectKind::Tree => Self::Tree,
            ObjectKind::Blob => Self::Blob,
            ObjectKind::Tag => Self::Tag,
        }
    }

    pub fn is_delta(self) -> bool {
        matches!(self, Self::OfsDelta { .. } | Self::RefDelta { .. })
    }
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;
pub const PACK_TRAILER_SIZE: usize = 20;
