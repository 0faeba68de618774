//! Mutation record types.

use bytes::Bytes;

/// Tag byte selecting how the rest of a record is parsed.
///
/// Tags outside the four defined types decode as [`RecordType::Unknown`]
/// and are read like a deletion: a key and no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Delete a key. Key only. Tag `0x0`.
    Deletion,
    /// Put a key/value pair. Key and value. Tag `0x1`.
    Value,
    /// Merge an operand into a key. Key and value. Tag `0x2`.
    Merge,
    /// Opaque blob carried in the log but never applied. Key field only.
    /// Tag `0x3`.
    LogData,
    /// Any other tag byte, kept as read. Key field only.
    Unknown(u8),
}

impl RecordType {
    /// Converts a tag byte to a record type.
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        match b {
            0x0 => Self::Deletion,
            0x1 => Self::Value,
            0x2 => Self::Merge,
            0x3 => Self::LogData,
            other => Self::Unknown(other),
        }
    }

    /// Converts the record type to its tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Deletion => 0x0,
            Self::Value => 0x1,
            Self::Merge => 0x2,
            Self::LogData => 0x3,
            Self::Unknown(tag) => tag,
        }
    }

    /// Whether the tag is one of the defined record types.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Whether a value varstring follows the key.
    #[must_use]
    pub const fn has_value(self) -> bool {
        matches!(self, Self::Value | Self::Merge)
    }

    /// Whether the engine applies records of this type to the key space.
    ///
    /// Every record counts toward the header count; only these consume a
    /// sequence number when committed.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Deletion | Self::Value | Self::Merge)
    }
}

/// A decoded record borrowing from the batch bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// The record type.
    pub record_type: RecordType,
    /// Key bytes (the blob, for [`RecordType::LogData`]).
    pub key: &'a [u8],
    /// Value bytes; `None` for deletions and log data.
    pub value: Option<&'a [u8]>,
}

impl Record<'static> {
    pub(crate) const EMPTY: Self = Record {
        record_type: RecordType::Deletion,
        key: &[],
        value: None,
    };
}

impl Record<'_> {
    /// Copies the record out of the batch buffer.
    #[must_use]
    pub fn to_owned_record(&self) -> OwnedRecord {
        OwnedRecord {
            record_type: self.record_type,
            key: Bytes::copy_from_slice(self.key),
            value: self.value.map(Bytes::copy_from_slice),
        }
    }
}

/// A record that owns its key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRecord {
    /// The record type.
    pub record_type: RecordType,
    /// Key bytes.
    pub key: Bytes,
    /// Value bytes; `None` for deletions and log data.
    pub value: Option<Bytes>,
}

impl OwnedRecord {
    /// A put record.
    pub fn value(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            record_type: RecordType::Value,
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// A deletion record.
    pub fn deletion(key: impl Into<Bytes>) -> Self {
        Self {
            record_type: RecordType::Deletion,
            key: key.into(),
            value: None,
        }
    }

    /// Borrows this record in the iterator's representation.
    #[must_use]
    pub fn as_record(&self) -> Record<'_> {
        Record {
            record_type: self.record_type,
            key: &self.key,
            value: self.value.as_deref(),
        }
    }
}

/// The fixed 12-byte batch header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchHeader {
    /// Sequence number assigned by the engine at commit time.
    pub sequence: u64,
    /// Number of records in the body.
    pub count: u32,
}
