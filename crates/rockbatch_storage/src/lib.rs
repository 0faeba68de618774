//! # rockbatch Storage
//!
//! Append-only byte stores used as the write-ahead log sink for rockbatch.
//!
//! A backend never interprets what it holds. The engine writes framed,
//! serialized write batches into it and reads them back during recovery;
//! the framing and the batch format live in the layers above.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - Ephemeral log, used by tests and in-memory databases
//! - [`FileBackend`] - A single log file on the local file system
//!
//! ## Example
//!
//! ```rust
//! use rockbatch_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut log = InMemoryBackend::new();
//! let first = log.append(b"frame-1").unwrap();
//! let second = log.append(b"frame-2").unwrap();
//! assert_eq!((first, second), (0, 7));
//! assert_eq!(log.read_at(second, 7).unwrap(), b"frame-2");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
