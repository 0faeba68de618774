//! Streaming WAL frame iterator.

use crate::error::{CoreError, CoreResult};
use crate::wal::{frame_checksum, FRAME_HEADER_SIZE};
use rockbatch_storage::StorageBackend;
use tracing::warn;

/// One complete frame read from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalFrame {
    /// Offset of the frame header in the log.
    pub offset: u64,
    /// Serialized batch carried by the frame.
    pub payload: Vec<u8>,
}

impl WalFrame {
    /// Offset just past the end of this frame.
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.offset + (FRAME_HEADER_SIZE + self.payload.len()) as u64
    }
}

/// Reads frames one at a time from a storage backend.
///
/// Memory use is bounded by the largest frame. The iterator stops at the
/// first incomplete frame; [`valid_end`](Self::valid_end) then tells how
/// much of the log is intact.
pub struct WalFrameIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    offset: u64,
    paranoid: bool,
    finished: bool,
}

impl<'a> WalFrameIterator<'a> {
    /// Creates an iterator over the whole log.
    ///
    /// With `paranoid` set, a checksum mismatch is reported as an error;
    /// otherwise it ends iteration like a torn tail.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn new(backend: &'a dyn StorageBackend, paranoid: bool) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: 0,
            paranoid,
            finished: false,
        })
    }

    /// Offset just past the last complete, checksum-valid frame read so far.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Size of the log when iteration started.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    fn read_frame(&mut self) -> CoreResult<Option<WalFrame>> {
        let start = self.offset;
        let remaining = self.total_size - start;
        if remaining < FRAME_HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, FRAME_HEADER_SIZE)?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let stored = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if u64::from(len) > remaining - FRAME_HEADER_SIZE as u64 {
            return Ok(None);
        }

        let payload = self
            .backend
            .read_at(start + FRAME_HEADER_SIZE as u64, len as usize)?;
        let computed = frame_checksum(&payload);
        if computed != stored {
            if self.paranoid {
                return Err(CoreError::ChecksumMismatch {
                    offset: start,
                    expected: stored,
                    actual: computed,
                });
            }
            warn!(offset = start, "checksum mismatch in WAL frame, treating as end of log");
            return Ok(None);
        }

        let frame = WalFrame {
            offset: start,
            payload,
        };
        self.offset = frame.end_offset();
        Ok(Some(frame))
    }
}

impl Iterator for WalFrameIterator<'_> {
    type Item = CoreResult<WalFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rockbatch_storage::InMemoryBackend;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&frame_checksum(payload).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn empty_log() {
        let backend = InMemoryBackend::new();
        let mut iter = WalFrameIterator::new(&backend, true).unwrap();
        assert!(iter.next().is_none());
        assert_eq!(iter.valid_end(), 0);
    }

    #[test]
    fn reads_frames_in_order() {
        let mut data = frame(b"first");
        data.extend(frame(b""));
        data.extend(frame(b"third"));
        let backend = InMemoryBackend::with_data(data.clone());

        let mut iter = WalFrameIterator::new(&backend, true).unwrap();
        let frames: Vec<WalFrame> = iter.by_ref().collect::<CoreResult<_>>().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].offset, 0);
        assert_eq!(frames[0].payload, b"first");
        assert_eq!(frames[1].offset, 13);
        assert!(frames[1].payload.is_empty());
        assert_eq!(frames[2].payload, b"third");
        assert_eq!(iter.valid_end(), data.len() as u64);
    }

    #[test]
    fn torn_header_ends_log() {
        let mut data = frame(b"whole");
        let good = data.len() as u64;
        data.extend_from_slice(&[5, 0, 0]);
        let backend = InMemoryBackend::with_data(data);

        let mut iter = WalFrameIterator::new(&backend, true).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().is_none());
        assert_eq!(iter.valid_end(), good);
    }

    #[test]
    fn torn_payload_ends_log() {
        let mut data = frame(b"whole");
        let good = data.len() as u64;
        let torn = frame(b"partial payload");
        data.extend_from_slice(&torn[..torn.len() - 4]);
        let backend = InMemoryBackend::with_data(data);

        let mut iter = WalFrameIterator::new(&backend, true).unwrap();
        assert_eq!(iter.by_ref().count(), 1);
        assert_eq!(iter.valid_end(), good);
        assert!(iter.total_size() > good);
    }

    #[test]
    fn checksum_mismatch_is_fatal_when_paranoid() {
        let mut data = frame(b"whole");
        let corrupt_at = data.len() + FRAME_HEADER_SIZE;
        data.extend(frame(b"damaged"));
        data[corrupt_at] ^= 0xFF;
        let backend = InMemoryBackend::with_data(data);

        let mut iter = WalFrameIterator::new(&backend, true).unwrap();
        assert!(iter.next().unwrap().is_ok());
        let err = iter.next().unwrap().unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { offset: 13, .. }));
        assert!(iter.next().is_none());
    }

    #[test]
    fn checksum_mismatch_is_tail_when_lenient() {
        let mut data = frame(b"whole");
        let good = data.len() as u64;
        let corrupt_at = data.len() + FRAME_HEADER_SIZE;
        data.extend(frame(b"damaged"));
        data.extend(frame(b"after"));
        data[corrupt_at] ^= 0xFF;
        let backend = InMemoryBackend::with_data(data);

        let mut iter = WalFrameIterator::new(&backend, false).unwrap();
        assert_eq!(iter.by_ref().count(), 1);
        assert_eq!(iter.valid_end(), good);
    }
}
