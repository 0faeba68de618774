//! The write path between a batch and a storage engine.

use crate::error::CoreResult;
use crate::options::WriteOptions;
use crate::types::SequenceNumber;
use rockbatch_codec::WriteBatch;
use std::sync::Arc;

/// Something that commits write batches.
///
/// An implementation applies every record of the batch atomically: readers
/// observe all of it or none of it. It assigns the batch a sequence number
/// greater than every sequence it handed out before and stores it in the
/// batch header through [`WriteBatch::set_sequence`].
pub trait BatchSubmitter {
    /// Commits `batch` and returns the sequence number of its first record.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is malformed or cannot be made durable
    /// as requested by `options`. Nothing is applied in that case and the
    /// batch header keeps its previous sequence.
    fn write(&self, options: &WriteOptions, batch: &mut WriteBatch) -> CoreResult<SequenceNumber>;
}

impl<T: BatchSubmitter + ?Sized> BatchSubmitter for Arc<T> {
    fn write(&self, options: &WriteOptions, batch: &mut WriteBatch) -> CoreResult<SequenceNumber> {
        (**self).write(options, batch)
    }
}

impl<T: BatchSubmitter + ?Sized> BatchSubmitter for &T {
    fn write(&self, options: &WriteOptions, batch: &mut WriteBatch) -> CoreResult<SequenceNumber> {
        (**self).write(options, batch)
    }
}
