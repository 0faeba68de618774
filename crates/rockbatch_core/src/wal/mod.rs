//! Batch write-ahead log.
//!
//! Every committed [`WriteBatch`](rockbatch_codec::WriteBatch) is appended to
//! the log as one frame before it is applied, and the log is replayed on
//! open to rebuild the table.
//!
//! ## Frame Format
//!
//! ```text
//! | length (4, LE) | crc32 (4, LE) | batch (length) |
//! ```
//!
//! The checksum covers the batch bytes only. The batch carries its own
//! sequence number and record count in its header, so frames need no
//! further metadata.
//!
//! ## Recovery Policy
//!
//! Tolerated conditions end the log cleanly:
//!
//! - **Truncated frame header**: fewer than 8 bytes left
//! - **Truncated payload**: the length runs past the end of the log
//!
//! Both come from a crash in the middle of an append. Recovery truncates
//! the log back to the end of the last complete frame.
//!
//! A **checksum mismatch** is fatal with `paranoid_checks` and returns
//! [`CoreError::ChecksumMismatch`](crate::CoreError::ChecksumMismatch).
//! Without it, the damaged frame and everything after it are treated as a
//! torn tail.

mod iterator;
mod writer;

pub use iterator::{WalFrame, WalFrameIterator};
pub use writer::{WalManager, WalRecovery};

/// Size of the frame header: length + crc32.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Checksum of a frame payload.
#[must_use]
pub fn frame_checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}
