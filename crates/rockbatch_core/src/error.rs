//! Error types for rockbatch core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in rockbatch core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] rockbatch_storage::StorageError),

    /// Write batch decoding error.
    #[error("batch codec error: {0}")]
    Codec(#[from] rockbatch_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// WAL is corrupted or invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A WAL frame's checksum does not match its payload.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the frame in the log.
        offset: u64,
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// An argument or option value was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected value.
        message: String,
    },

    /// Database is already open or locked.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database directory is missing, already exists, or is not usable.
    #[error("invalid database: {message}")]
    InvalidDatabase {
        /// Description of the problem.
        message: String,
    },

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid database error.
    pub fn invalid_database(message: impl Into<String>) -> Self {
        Self::InvalidDatabase {
            message: message.into(),
        }
    }
}
