//! Write batch builder.

use crate::error::{CodecError, CodecResult};
use crate::iterator::WriteBatchIterator;
use crate::record::{BatchHeader, RecordType};
use crate::varint::put_varstring;
use crate::HEADER_SIZE;

const SEQUENCE_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 8;

/// An ordered set of mutations to be applied atomically.
///
/// The batch keeps its records already encoded in the wire format, so
/// [`data`](Self::data) is a plain borrow with no serialization step. Keys
/// and values are copied in on every append; callers may reuse their buffers
/// as soon as the call returns.
///
/// ```
/// use rockbatch_codec::{RecordType, WriteBatch};
///
/// let mut batch = WriteBatch::new();
/// batch.delete(b"removed");
/// batch.put(b"added", b"data");
/// assert_eq!(batch.count(), 2);
///
/// let mut iter = batch.iter();
/// assert!(iter.advance());
/// assert_eq!(iter.record().record_type, RecordType::Deletion);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    // Always at least HEADER_SIZE bytes.
    rep: Vec<u8>,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBatch {
    /// Creates an empty batch: a zeroed header and no records.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rep: vec![0; HEADER_SIZE],
        }
    }

    /// Creates an empty batch with room for `bytes` bytes of encoded data.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        let mut rep = Vec::with_capacity(bytes.max(HEADER_SIZE));
        rep.resize(HEADER_SIZE, 0);
        Self { rep }
    }

    /// Adopts serialized batch bytes, e.g. a batch read back from a log.
    ///
    /// The body is not validated here; iterate it to find out whether it is
    /// well formed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TooSmall`] if `rep` cannot hold a header.
    pub fn from_bytes(rep: Vec<u8>) -> CodecResult<Self> {
        if rep.len() < HEADER_SIZE {
            return Err(CodecError::too_small(rep.len()));
        }
        Ok(Self { rep })
    }

    /// Queues a put of `key` to `value`. Either may be empty.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.push_record(RecordType::Value, key, Some(value));
    }

    /// Queues a deletion of `key`.
    ///
    /// An empty key is valid and encodes as a zero length prefix.
    pub fn delete(&mut self, key: &[u8]) {
        self.push_record(RecordType::Deletion, key, None);
    }

    /// Queues a merge of `operand` into `key`.
    pub fn merge(&mut self, key: &[u8], operand: &[u8]) {
        self.push_record(RecordType::Merge, key, Some(operand));
    }

    /// Appends a blob that is written to the log alongside the batch but
    /// never applied. Like every record it adds one to [`count`](Self::count).
    ///
    /// ```
    /// use rockbatch_codec::WriteBatch;
    ///
    /// let mut batch = WriteBatch::new();
    /// batch.put(b"a", b"1");
    /// batch.put_log_data(b"replicated-from: node-2");
    /// assert_eq!(batch.count(), 2);
    /// assert_eq!(batch.iter().count(), 2);
    /// ```
    pub fn put_log_data(&mut self, blob: &[u8]) {
        self.push_record(RecordType::LogData, blob, None);
    }

    /// Drops every record and resets the header.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(HEADER_SIZE, 0);
    }

    /// Appends all records of `other`, preserving their order.
    pub fn append(&mut self, other: &WriteBatch) {
        self.rep.extend_from_slice(&other.rep[HEADER_SIZE..]);
        self.set_count(self.count().wrapping_add(other.count()));
    }

    /// The serialized batch: header followed by the encoded records.
    ///
    /// The borrow ends before the next mutation, so the bytes can never be
    /// observed half-updated.
    #[doc(alias = "serialize")]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.rep
    }

    /// Consumes the batch and returns its serialized bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.rep
    }

    /// Number of records in the batch, as stored in the header.
    #[must_use]
    pub fn count(&self) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.rep[COUNT_OFFSET..HEADER_SIZE]);
        u32::from_le_bytes(buf)
    }

    /// Sequence number stored in the header.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.rep[SEQUENCE_OFFSET..COUNT_OFFSET]);
        u64::from_le_bytes(buf)
    }

    /// Stores the sequence number the engine assigned to this batch.
    pub fn set_sequence(&mut self, sequence: u64) {
        self.rep[SEQUENCE_OFFSET..COUNT_OFFSET].copy_from_slice(&sequence.to_le_bytes());
    }

    /// Decoded header fields.
    #[must_use]
    pub fn header(&self) -> BatchHeader {
        BatchHeader {
            sequence: self.sequence(),
            count: self.count(),
        }
    }

    /// True when the batch holds no records of any type.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rep.len() == HEADER_SIZE
    }

    /// Encoded size in bytes, header included.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.rep.len()
    }

    /// Iterates the records of this batch.
    #[must_use]
    pub fn iter(&self) -> WriteBatchIterator<'_> {
        WriteBatchIterator::new(&self.rep)
    }

    fn push_record(&mut self, record_type: RecordType, key: &[u8], value: Option<&[u8]>) {
        self.rep.push(record_type.as_byte());
        put_varstring(&mut self.rep, key);
        if let Some(value) = value {
            put_varstring(&mut self.rep, value);
        }
        self.set_count(self.count().wrapping_add(1));
    }

    fn set_count(&mut self, count: u32) {
        self.rep[COUNT_OFFSET..HEADER_SIZE].copy_from_slice(&count.to_le_bytes());
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = CodecResult<crate::Record<'a>>;
    type IntoIter = WriteBatchIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
