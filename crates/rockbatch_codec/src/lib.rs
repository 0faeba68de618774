//! # rockbatch Codec
//!
//! The write-batch wire format: how an ordered set of mutations is laid out
//! in a single buffer that can be appended to a write-ahead log in one piece
//! and replayed record by record.
//!
//! ## Format
//!
//! ```text
//! batch     := header body
//! header    := sequence:fixed64(LE) count:fixed32(LE)
//! body      := record*
//! record    := Value    0x1 key:varstring value:varstring
//!            | Deletion 0x0 key:varstring
//!            | Merge    0x2 key:varstring value:varstring
//!            | LogData  0x3 blob:varstring
//!            | other    tag key:varstring
//! varstring := len:varint data:uint8[len]
//! ```
//!
//! `count` is the number of records in the body, log data included.
//!
//! Varints use 7 bits per byte, least significant group first, with the high
//! bit as the continuation flag.
//!
//! ## Usage
//!
//! ```
//! use rockbatch_codec::{RecordType, WriteBatch};
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"a", b"1");
//! batch.delete(b"b");
//!
//! let mut iter = batch.iter();
//! while iter.advance() {
//!     let record = iter.record();
//!     if record.record_type == RecordType::Value {
//!         assert_eq!(record.value, Some(&b"1"[..]));
//!     }
//! }
//! assert!(iter.error().is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod error;
mod iterator;
mod record;
pub mod varint;

pub use batch::WriteBatch;
pub use error::{CodecError, CodecResult};
pub use iterator::WriteBatchIterator;
pub use record::{BatchHeader, OwnedRecord, Record, RecordType};

/// Size of the batch header: an 8-byte sequence and a 4-byte count.
pub const HEADER_SIZE: usize = 12;
