//! WAL writer and recovery.

use crate::error::{CoreError, CoreResult};
use crate::wal::{frame_checksum, WalFrame, WalFrameIterator, FRAME_HEADER_SIZE};
use parking_lot::Mutex;
use rockbatch_storage::StorageBackend;
use tracing::warn;

/// Outcome of replaying the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalRecovery {
    /// Number of frames replayed.
    pub frames: usize,
    /// Bytes of torn tail cut off the end of the log.
    pub discarded_bytes: u64,
}

/// Appends batch frames to a storage backend and replays them.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
}

impl WalManager {
    /// Creates a WAL over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Appends one frame carrying `payload` and returns its offset.
    ///
    /// With `sync` set, the frame is on durable media when this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not fit a frame (4 GiB) or the
    /// backend fails.
    pub fn append(&self, payload: &[u8], sync: bool) -> CoreResult<u64> {
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::invalid_argument("batch too large for a WAL frame"))?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&frame_checksum(payload).to_le_bytes());
        frame.extend_from_slice(payload);

        let mut backend = self.backend.lock();
        let offset = backend.append(&frame)?;
        if sync {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        Ok(offset)
    }

    /// Replays every intact frame through `apply`, in log order, then cuts
    /// off any torn tail so later appends start at a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns the first error from the log or from `apply`. The log is not
    /// truncated in that case.
    pub fn recover<F>(&self, paranoid: bool, mut apply: F) -> CoreResult<WalRecovery>
    where
        F: FnMut(&WalFrame) -> CoreResult<()>,
    {
        let mut backend = self.backend.lock();
        let mut recovery = WalRecovery::default();

        let (valid_end, total_size) = {
            let mut iter = WalFrameIterator::new(&**backend, paranoid)?;
            for frame in iter.by_ref() {
                apply(&frame?)?;
                recovery.frames += 1;
            }
            (iter.valid_end(), iter.total_size())
        };

        if valid_end < total_size {
            recovery.discarded_bytes = total_size - valid_end;
            warn!(
                offset = valid_end,
                discarded = recovery.discarded_bytes,
                "discarding torn WAL tail"
            );
            backend.truncate(valid_end)?;
            backend.sync()?;
        }

        Ok(recovery)
    }

    /// Reads all intact frames without modifying the log.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or, when `paranoid`, a checksum
    /// does not match.
    pub fn read_all(&self, paranoid: bool) -> CoreResult<Vec<WalFrame>> {
        let backend = self.backend.lock();
        let iter = WalFrameIterator::new(&**backend, paranoid)?;
        iter.collect()
    }

    /// Pushes buffered frames to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Forces all frames to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be read.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    #[cfg(test)]
    pub(crate) fn append_raw_for_testing(&self, bytes: &[u8]) {
        self.backend.lock().append(bytes).unwrap();
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager").finish_non_exhaustive()
    }
}
