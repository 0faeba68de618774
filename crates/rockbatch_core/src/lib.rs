//! # rockbatch Core
//!
//! Everything around a write batch once it leaves the builder:
//!
//! - [`Options`], [`ReadOptions`] and [`WriteOptions`] with the opaque
//!   handles they carry ([`Cache`], [`Comparator`], [`FilterPolicy`],
//!   [`Env`], [`InfoLog`], [`Snapshot`])
//! - the [`BatchSubmitter`] interface that commits batches
//! - [`Database`], a reference engine that logs each batch to a
//!   write-ahead log, applies it to a multi-version table and replays the
//!   log on open
//!
//! ## Example
//!
//! ```
//! use rockbatch_codec::WriteBatch;
//! use rockbatch_core::{BatchSubmitter, Database, Options, ReadOptions, WriteOptions};
//!
//! let db = Database::open_in_memory(Options::default()).unwrap();
//!
//! let mut batch = WriteBatch::new();
//! batch.put(b"a", b"1");
//! batch.put(b"b", b"2");
//! let first = BatchSubmitter::write(&db, &WriteOptions::default(), &mut batch).unwrap();
//! assert_eq!(first.as_u64(), 1);
//! assert_eq!(db.latest_sequence().as_u64(), 2);
//!
//! assert_eq!(db.get(&ReadOptions::default(), b"b").unwrap(), Some(b"2".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod dir;
mod error;
mod handles;
mod iterator;
mod memtable;
mod options;
mod submit;
mod types;
pub mod wal;

pub use database::Database;
pub use dir::DatabaseDir;
pub use error::{CoreError, CoreResult};
pub use handles::{Cache, Comparator, Env, FilterPolicy, InfoLog, Snapshot};
pub use iterator::DbIterator;
pub use options::{
    CompactionStyle, CompressionType, Options, ReadOptions, UniversalCompactionOptions,
    WriteOptions,
};
pub use submit::BatchSubmitter;
pub use types::SequenceNumber;
