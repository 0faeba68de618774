//! Multi-version in-memory table.
//!
//! Each key maps to its versions in ascending sequence order. A version
//! holds either a value or a tombstone. Reads at sequence `s` see the newest
//! version with a sequence no greater than `s`.

use crate::error::CoreResult;
use crate::types::SequenceNumber;
use rockbatch_codec::{Record, RecordType, WriteBatchIterator};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Version {
    sequence: SequenceNumber,
    value: Option<Vec<u8>>,
}

/// Result of applying one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Applied {
    /// Sequence of the first data record.
    pub first: SequenceNumber,
    /// Data records applied; each consumed one sequence number.
    pub count: u32,
}

impl Applied {
    /// Sequence of the last data record, if any.
    pub(crate) fn last(&self) -> Option<SequenceNumber> {
        (self.count > 0).then(|| self.first.advance(u64::from(self.count) - 1))
    }
}

/// A batch decoded in strict mode, ready to apply.
///
/// Decoding happens before anything is logged or changed, so a malformed
/// batch is rejected without side effects.
#[derive(Debug)]
pub(crate) struct DecodedBatch<'a> {
    first: SequenceNumber,
    records: Vec<Record<'a>>,
}

impl<'a> DecodedBatch<'a> {
    pub(crate) fn decode(batch: &'a [u8]) -> CoreResult<Self> {
        let mut iter = WriteBatchIterator::strict(batch);
        let mut records = Vec::new();
        while iter.advance() {
            records.push(*iter.record());
        }
        if let Some(err) = iter.error() {
            return Err(err.clone().into());
        }
        Ok(Self {
            first: SequenceNumber(iter.header().map_or(0, |h| h.sequence)),
            records,
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemTable {
    entries: BTreeMap<Vec<u8>, Vec<Version>>,
    approximate_size: usize,
}

impl MemTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies a serialized batch. See [`DecodedBatch::decode`] and
    /// [`apply_decoded`](Self::apply_decoded).
    pub(crate) fn apply(&mut self, batch: &[u8], horizon: SequenceNumber) -> CoreResult<Applied> {
        let decoded = DecodedBatch::decode(batch)?;
        Ok(self.apply_decoded(&decoded, horizon))
    }

    /// Applies a decoded batch. The `n`-th data record gets sequence
    /// `header.sequence + n`. Merge operands replace the current value. Log
    /// data is counted in the header but takes no sequence number.
    ///
    /// Versions that no reader at or above `horizon` can observe are
    /// dropped for every key the batch touches.
    pub(crate) fn apply_decoded(&mut self, batch: &DecodedBatch<'_>, horizon: SequenceNumber) -> Applied {
        let mut sequence = batch.first;
        let mut count = 0u32;
        for record in &batch.records {
            let value = match record.record_type {
                RecordType::Deletion => None,
                RecordType::Value | RecordType::Merge => {
                    Some(record.value.unwrap_or_default().to_vec())
                }
                RecordType::LogData | RecordType::Unknown(_) => continue,
            };
            self.insert(record.key, sequence, value, horizon);
            sequence = sequence.next();
            count += 1;
        }

        Applied {
            first: batch.first,
            count,
        }
    }

    fn insert(
        &mut self,
        key: &[u8],
        sequence: SequenceNumber,
        value: Option<Vec<u8>>,
        horizon: SequenceNumber,
    ) {
        self.approximate_size += key.len() + value.as_ref().map_or(0, Vec::len);
        let versions = self.entries.entry(key.to_vec()).or_default();
        versions.push(Version { sequence, value });

        // Everything older than the newest version at or below the horizon
        // is shadowed for every live reader.
        let visible = versions
            .iter()
            .rposition(|v| v.sequence <= horizon)
            .unwrap_or(0);
        let mut stale = visible;
        if versions[visible].sequence <= horizon && versions[visible].value.is_none() {
            stale += 1;
        }
        if stale > 0 {
            for old in versions.drain(..stale) {
                self.approximate_size = self
                    .approximate_size
                    .saturating_sub(key.len() + old.value.map_or(0, |v| v.len()));
            }
        }
        if versions.is_empty() {
            self.entries.remove(key);
        }
    }

    /// Value of `key` as of sequence `at`.
    pub(crate) fn get(&self, key: &[u8], at: SequenceNumber) -> Option<&[u8]> {
        self.entries
            .get(key)?
            .iter()
            .rev()
            .find(|v| v.sequence <= at)?
            .value
            .as_deref()
    }

    /// Live key/value pairs as of sequence `at`, in bytewise key order.
    pub(crate) fn visible_entries(&self, at: SequenceNumber) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .iter()
            .filter_map(|(key, versions)| {
                let version = versions.iter().rev().find(|v| v.sequence <= at)?;
                let value = version.value.as_ref()?;
                Some((key.clone(), value.clone()))
            })
            .collect()
    }

    /// Number of stored versions across all keys.
    #[cfg(test)]
    fn version_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Approximate bytes of keys and values held.
    pub(crate) fn approximate_size(&self) -> usize {
        self.approximate_size
    }
}
