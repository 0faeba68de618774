//! Write batch iterator.
//!
//! Decodes the records of a serialized batch lazily, front to back. The
//! iterator never owns the bytes: every [`Record`] it yields borrows from the
//! caller's buffer.
//!
//! ## Error Policy
//!
//! - Input shorter than the 12-byte header is an empty batch, not an error.
//! - A truncated varint, or a length that runs past the end of the body,
//!   latches [`CodecError::ShortBuffer`].
//! - A tag byte outside the defined types is read as a key-only
//!   [`RecordType::Unknown`] record. Only strict mode rejects it, with
//!   [`CodecError::UnknownRecordType`].
//! - Latched errors are sticky: every later [`advance`](WriteBatchIterator::advance)
//!   returns false without parsing again.
//! - The header count is not checked unless the iterator was built with
//!   [`strict`](WriteBatchIterator::strict). Every record, log data
//!   included, counts.

use crate::error::{CodecError, CodecResult};
use crate::record::{BatchHeader, Record, RecordType};
use crate::varint::{decode_fixed32, decode_fixed64, decode_varstring};
use crate::HEADER_SIZE;

/// Forward-only cursor over the records of a serialized write batch.
///
/// Two ways to drive it:
///
/// - Pull: call [`advance`](Self::advance), read [`record`](Self::record),
///   and check [`error`](Self::error) once `advance` returns false.
/// - `Iterator`: yields `Ok(record)` for each record and then the latched
///   error once, if there is one.
///
/// ```
/// use rockbatch_codec::{RecordType, WriteBatch, WriteBatchIterator};
///
/// let mut batch = WriteBatch::new();
/// batch.put(b"a", b"1");
/// batch.delete(b"b");
///
/// let mut iter = WriteBatchIterator::new(batch.data());
/// let mut seen = Vec::new();
/// while iter.advance() {
///     seen.push((iter.record().record_type, iter.record().key.to_vec()));
/// }
/// assert!(iter.error().is_none());
/// assert_eq!(seen[1], (RecordType::Deletion, b"b".to_vec()));
/// ```
///
/// # Record slot
///
/// [`record`](Self::record) is a single slot overwritten by every `advance`.
/// The slices inside it point into the source buffer, so a `Record` copied
/// out of the slot stays valid for as long as that buffer does. Use
/// [`Record::to_owned_record`] to detach it entirely.
#[derive(Debug, Clone)]
pub struct WriteBatchIterator<'a> {
    header: Option<BatchHeader>,
    body: &'a [u8],
    record: Record<'a>,
    err: Option<CodecError>,
    strict: bool,
    decoded: u32,
    error_yielded: bool,
}

impl<'a> WriteBatchIterator<'a> {
    /// Creates a lenient iterator over `data`, header included.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        let (header, body) = match data.split_at_checked(HEADER_SIZE) {
            Some((head, body)) => (parse_header(head), body),
            None => (None, &data[data.len()..]),
        };
        Self {
            header,
            body,
            record: Record::EMPTY,
            err: None,
            strict: false,
            decoded: 0,
            error_yielded: false,
        }
    }

    /// Creates an iterator that also validates what lenient mode accepts.
    ///
    /// - A record with an unknown tag latches
    ///   [`CodecError::UnknownRecordType`].
    /// - When the body ends cleanly but the number of records decoded
    ///   differs from the header, [`CodecError::CountMismatch`] is latched.
    #[must_use]
    pub fn strict(data: &'a [u8]) -> Self {
        Self {
            strict: true,
            ..Self::new(data)
        }
    }

    /// Decodes the next record into the record slot.
    ///
    /// Returns false at the end of the body or when decoding fails; check
    /// [`error`](Self::error) to tell the two apart.
    pub fn advance(&mut self) -> bool {
        self.record = Record::EMPTY;
        if self.err.is_some() {
            return false;
        }
        if self.body.is_empty() {
            self.check_count();
            return false;
        }

        match self.decode_record() {
            Ok(record) => {
                self.record = record;
                true
            }
            Err(err) => {
                self.latch(err);
                false
            }
        }
    }

    /// The record decoded by the last successful [`advance`](Self::advance).
    ///
    /// After `advance` returns false the slot holds an empty deletion.
    #[must_use]
    pub fn record(&self) -> &Record<'a> {
        &self.record
    }

    /// The latched error, if iteration stopped on malformed input.
    #[must_use]
    pub fn error(&self) -> Option<&CodecError> {
        self.err.as_ref()
    }

    /// The batch header, or `None` when the input was shorter than a header.
    #[must_use]
    pub fn header(&self) -> Option<BatchHeader> {
        self.header
    }

    /// Number of records decoded so far.
    #[must_use]
    pub fn decoded_count(&self) -> u32 {
        self.decoded
    }

    /// Body bytes not yet decoded.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        self.body
    }

    fn decode_record(&mut self) -> CodecResult<Record<'a>> {
        let (&tag, rest) = self.body.split_first().ok_or(CodecError::ShortBuffer)?;
        self.body = rest;
        let record_type = RecordType::from_byte(tag);
        if self.strict && !record_type.is_known() {
            return Err(CodecError::UnknownRecordType { tag });
        }

        let key = self.take_varstring()?;
        let value = if record_type.has_value() {
            Some(self.take_varstring()?)
        } else {
            None
        };

        self.decoded = self.decoded.wrapping_add(1);
        Ok(Record {
            record_type,
            key,
            value,
        })
    }

    fn take_varstring(&mut self) -> CodecResult<&'a [u8]> {
        let body = self.body;
        let (data, consumed) = decode_varstring(body).ok_or(CodecError::ShortBuffer)?;
        self.body = &body[consumed..];
        Ok(data)
    }

    fn check_count(&mut self) {
        if !self.strict {
            return;
        }
        if let Some(header) = self.header {
            if header.count != self.decoded {
                self.latch(CodecError::CountMismatch {
                    expected: header.count,
                    actual: self.decoded,
                });
            }
        }
    }

    fn latch(&mut self, err: CodecError) {
        tracing::debug!(
            error = %err,
            decoded = self.decoded,
            remaining = self.body.len(),
            "write batch iteration stopped"
        );
        self.err = Some(err);
    }
}

impl<'a> Iterator for WriteBatchIterator<'a> {
    type Item = CodecResult<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            return Some(Ok(self.record));
        }
        if self.error_yielded {
            return None;
        }
        let err = self.err.clone()?;
        self.error_yielded = true;
        Some(Err(err))
    }
}

fn parse_header(head: &[u8]) -> Option<BatchHeader> {
    Some(BatchHeader {
        sequence: decode_fixed64(head)?,
        count: decode_fixed32(&head[8..])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteBatch;

    fn collect(data: &[u8]) -> (Vec<Record<'_>>, Option<CodecError>) {
        let mut iter = WriteBatchIterator::new(data);
        let mut records = Vec::new();
        while iter.advance() {
            records.push(*iter.record());
        }
        (records, iter.error().cloned())
    }

    fn sample_batch() -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.delete(b"b");
        batch.put(b"c", b"");
        batch
    }

    #[test]
    fn decodes_put_delete_put_in_order() {
        let batch = sample_batch();
        let (records, err) = collect(batch.data());
        assert_eq!(err, None);
        assert_eq!(
            records,
            vec![
                Record {
                    record_type: RecordType::Value,
                    key: b"a",
                    value: Some(&b"1"[..]),
                },
                Record {
                    record_type: RecordType::Deletion,
                    key: b"b",
                    value: None,
                },
                Record {
                    record_type: RecordType::Value,
                    key: b"c",
                    value: Some(&b""[..]),
                },
            ]
        );
    }

    #[test]
    fn exhausted_iterator_stays_exhausted() {
        let batch = sample_batch();
        let mut iter = batch.iter();
        while iter.advance() {}
        assert!(!iter.advance());
        assert!(!iter.advance());
        assert!(iter.error().is_none());
        assert_eq!(*iter.record(), Record::EMPTY);
    }

    #[test]
    fn short_input_is_an_empty_batch() {
        for len in 0..HEADER_SIZE {
            let data = vec![0xffu8; len];
            let mut iter = WriteBatchIterator::new(&data);
            assert!(!iter.advance(), "len {len}");
            assert!(iter.error().is_none());
            assert!(iter.header().is_none());
        }
    }

    #[test]
    fn bare_header_has_no_records() {
        let batch = WriteBatch::new();
        let (records, err) = collect(batch.data());
        assert!(records.is_empty());
        assert_eq!(err, None);
    }

    #[test]
    fn empty_key_and_value_roundtrip() {
        let mut batch = WriteBatch::new();
        batch.put(b"", b"");
        batch.delete(b"");
        let (records, err) = collect(batch.data());
        assert_eq!(err, None);
        assert_eq!(records[0].record_type, RecordType::Value);
        assert_eq!(records[0].key.len(), 0);
        assert_eq!(records[0].value.map(<[u8]>::len), Some(0));
        assert_eq!(records[1].record_type, RecordType::Deletion);
        assert!(records[1].key.is_empty());
    }

    #[test]
    fn truncated_key_length_latches_short_buffer() {
        let mut data = WriteBatch::new().into_bytes();
        data.extend_from_slice(&[0x01, 0x80]);
        let (records, err) = collect(&data);
        assert!(records.is_empty());
        assert_eq!(err, Some(CodecError::ShortBuffer));
        assert!(err.as_ref().is_some_and(CodecError::is_truncation));
    }

    #[test]
    fn oversized_key_length_latches_short_buffer() {
        let mut data = WriteBatch::new().into_bytes();
        data.extend_from_slice(&[0x00, 0x7f, b'x']);
        let (records, err) = collect(&data);
        assert!(records.is_empty());
        assert_eq!(err, Some(CodecError::ShortBuffer));
    }

    #[test]
    fn missing_value_latches_short_buffer() {
        let mut data = WriteBatch::new().into_bytes();
        data.extend_from_slice(&[0x01, 0x01, b'k']);
        let (_, err) = collect(&data);
        assert_eq!(err, Some(CodecError::ShortBuffer));
    }

    #[test]
    fn huge_declared_length_does_not_panic() {
        let mut data = WriteBatch::new().into_bytes();
        data.push(0x00);
        data.extend_from_slice(&[0xff; 9]);
        data.push(0x01);
        let (_, err) = collect(&data);
        assert_eq!(err, Some(CodecError::ShortBuffer));
    }

    #[test]
    fn error_is_sticky() {
        let mut data = sample_batch().into_bytes();
        data.extend_from_slice(&[0x01, 0x05, b'x']);
        let mut iter = WriteBatchIterator::new(&data);
        let mut good = 0;
        while iter.advance() {
            good += 1;
        }
        assert_eq!(good, 3);
        let remaining = iter.remaining().len();
        assert!(!iter.advance());
        assert_eq!(iter.remaining().len(), remaining);
        assert_eq!(iter.error(), Some(&CodecError::ShortBuffer));
    }

    #[test]
    fn unknown_tag_reads_as_key_only_record() {
        let mut data = WriteBatch::new().into_bytes();
        data.extend_from_slice(&[0x07, 0x01, b'k']);
        data.extend_from_slice(&[0x01, 0x01, b'a', 0x01, b'1']);
        let (records, err) = collect(&data);
        assert_eq!(err, None);
        assert_eq!(
            records,
            vec![
                Record {
                    record_type: RecordType::Unknown(0x07),
                    key: b"k",
                    value: None,
                },
                Record {
                    record_type: RecordType::Value,
                    key: b"a",
                    value: Some(&b"1"[..]),
                },
            ]
        );
        assert_eq!(records[0].record_type.as_byte(), 0x07);
    }

    #[test]
    fn unknown_tag_with_truncated_key_is_short_buffer() {
        let mut data = WriteBatch::new().into_bytes();
        data.extend_from_slice(&[0x07, 0x04, b'k']);
        let (records, err) = collect(&data);
        assert!(records.is_empty());
        assert!(err.as_ref().is_some_and(CodecError::is_truncation));
    }

    #[test]
    fn strict_mode_rejects_unknown_tag() {
        let mut data = WriteBatch::new().into_bytes();
        data.extend_from_slice(&[0x07, 0x01, b'k']);
        let mut iter = WriteBatchIterator::strict(&data);
        assert!(!iter.advance());
        assert_eq!(iter.error(), Some(&CodecError::UnknownRecordType { tag: 0x07 }));
        assert!(!iter.error().is_some_and(CodecError::is_truncation));
    }

    #[test]
    fn merge_and_log_data_decode() {
        let mut batch = WriteBatch::new();
        batch.merge(b"counter", b"+1");
        batch.put_log_data(b"audit");
        let (records, err) = collect(batch.data());
        assert_eq!(err, None);
        assert_eq!(records[0].record_type, RecordType::Merge);
        assert_eq!(records[0].value, Some(&b"+1"[..]));
        assert_eq!(records[1].record_type, RecordType::LogData);
        assert_eq!(records[1].key, b"audit");
        assert_eq!(records[1].value, None);
    }

    #[test]
    fn lenient_mode_ignores_header_count() {
        let mut data = sample_batch().into_bytes();
        data[8] = 42;
        let (records, err) = collect(&data);
        assert_eq!(records.len(), 3);
        assert_eq!(err, None);
    }

    #[test]
    fn strict_mode_reports_count_mismatch() {
        let mut data = sample_batch().into_bytes();
        data[8] = 5;
        let mut iter = WriteBatchIterator::strict(&data);
        let mut seen = 0;
        while iter.advance() {
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert_eq!(
            iter.error(),
            Some(&CodecError::CountMismatch {
                expected: 5,
                actual: 3
            })
        );
    }

    #[test]
    fn strict_mode_accepts_consistent_batch() {
        let mut batch = sample_batch();
        batch.put_log_data(b"counted too");
        let mut iter = WriteBatchIterator::strict(batch.data());
        while iter.advance() {}
        assert!(iter.error().is_none());
        assert_eq!(iter.decoded_count(), 4);
        assert_eq!(iter.header().map(|h| h.count), Some(4));
    }

    #[test]
    fn header_is_exposed() {
        let mut batch = sample_batch();
        batch.set_sequence(77);
        let iter = batch.iter();
        assert_eq!(
            iter.header(),
            Some(BatchHeader {
                sequence: 77,
                count: 3
            })
        );
    }

    #[test]
    fn iterator_yields_error_once() {
        let mut data = sample_batch().into_bytes();
        data.extend_from_slice(&[0x00, 0x09]);
        let items: Vec<_> = WriteBatchIterator::new(&data).collect();
        assert_eq!(items.len(), 4);
        assert!(items[..3].iter().all(Result::is_ok));
        assert_eq!(items[3], Err(CodecError::ShortBuffer));
    }

    #[test]
    fn records_outlive_the_iterator() {
        let batch = sample_batch();
        let first = {
            let mut iter = batch.iter();
            assert!(iter.advance());
            *iter.record()
        };
        assert_eq!(first.key, b"a");
    }
}
