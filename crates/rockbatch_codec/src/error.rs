//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding a write batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A varint or a length-prefixed field runs past the end of the input.
    #[error("short buffer: record truncated or length field out of range")]
    ShortBuffer,

    /// The input is too small to hold a batch header.
    #[error("batch too small: {len} bytes, header needs {required}")]
    TooSmall {
        /// Length of the rejected input.
        len: usize,
        /// Minimum accepted length.
        required: usize,
    },

    /// Strict mode met a record whose tag byte is outside the known types.
    #[error("unknown record type tag {tag:#04x}")]
    UnknownRecordType {
        /// The offending tag byte.
        tag: u8,
    },

    /// The header's record count disagrees with the decoded body.
    #[error("record count mismatch: header declares {expected}, body holds {actual}")]
    CountMismatch {
        /// Count stored in the header.
        expected: u32,
        /// Number of records decoded from the body.
        actual: u32,
    },
}

impl CodecError {
    /// Creates a too-small error for an input of `len` bytes.
    pub fn too_small(len: usize) -> Self {
        Self::TooSmall {
            len,
            required: crate::HEADER_SIZE,
        }
    }

    /// Returns true if this error means the input ended mid-record.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::ShortBuffer)
    }
}
