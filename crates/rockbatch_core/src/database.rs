//! Database facade and recovery.

use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::handles::{Comparator, Snapshot, SnapshotRegistry};
use crate::iterator::DbIterator;
use crate::memtable::{DecodedBatch, MemTable};
use crate::options::{Options, ReadOptions, WriteOptions};
use crate::submit::BatchSubmitter;
use crate::types::SequenceNumber;
use crate::wal::WalManager;
use parking_lot::{Mutex, RwLock};
use rockbatch_codec::WriteBatch;
use rockbatch_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reference engine that commits write batches.
///
/// Every batch is appended to a write-ahead log as one frame and then
/// applied to a multi-version in-memory table. Opening a database replays
/// the log, so committed batches survive a restart.
///
/// # Opening a Database
///
/// ```rust
/// use rockbatch_core::{Database, Options, ReadOptions, WriteOptions};
/// use rockbatch_codec::WriteBatch;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db = Database::open(dir.path(), Options::new().create_if_missing(true)).unwrap();
///
/// let mut batch = WriteBatch::new();
/// batch.put(b"name", b"rockbatch");
/// batch.delete(b"stale");
/// db.write(&WriteOptions::new().sync(true), &mut batch).unwrap();
///
/// let value = db.get(&ReadOptions::default(), b"name").unwrap();
/// assert_eq!(value.as_deref(), Some(&b"rockbatch"[..]));
/// db.close().unwrap();
/// ```
///
/// # Concurrency
///
/// Writers are serialized. Readers never block on log I/O and see each
/// batch either completely or not at all.
pub struct Database {
    options: Options,
    comparator: Comparator,
    /// Holds the directory lock. None for databases without a directory.
    dir: Option<DatabaseDir>,
    wal: WalManager,
    table: RwLock<MemTable>,
    /// Serializes commits.
    write_lock: Mutex<()>,
    /// Sequence of the last applied record. Only changed under the table
    /// write lock.
    last_sequence: AtomicU64,
    snapshots: Arc<SnapshotRegistry>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens the database stored in directory `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if `options` do not validate or the
    ///   comparator name differs from the one the database was created with
    /// - [`CoreError::InvalidDatabase`] if the database is missing and
    ///   `create_if_missing` is false, or exists and `error_if_exists` is set
    /// - [`CoreError::DatabaseLocked`] if another handle has it open
    /// - recovery errors from replaying the log
    pub fn open(path: &Path, options: Options) -> CoreResult<Self> {
        options.validate()?;

        let dir = DatabaseDir::open(path, options.create_if_missing)?;
        let is_new = dir.is_new_database();
        if is_new && !options.create_if_missing {
            return Err(CoreError::invalid_database(format!(
                "{} does not exist (create_if_missing is false)",
                path.display()
            )));
        }
        if !is_new && options.error_if_exists {
            return Err(CoreError::invalid_database(format!(
                "{} exists (error_if_exists is true)",
                path.display()
            )));
        }

        let comparator = options.comparator_or_default();
        match dir.load_comparator_name()? {
            Some(stored) if stored != comparator.name() => {
                return Err(CoreError::invalid_argument(format!(
                    "comparator {} does not match existing comparator {stored}",
                    comparator.name()
                )));
            }
            Some(_) => {}
            None => dir.save_comparator_name(comparator.name())?,
        }

        let backend = FileBackend::open_with_create_dirs(&dir.wal_path())?;
        Self::build(options, Some(dir), Box::new(backend))
    }

    /// Opens a database whose log lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `options` do not validate.
    pub fn open_in_memory(options: Options) -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), options)
    }

    /// Opens a database over an existing log backend, replaying its frames.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `options` do not validate,
    /// or a recovery error from replaying the log.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, options: Options) -> CoreResult<Self> {
        options.validate()?;
        Self::build(options, None, backend)
    }

    fn build(
        options: Options,
        dir: Option<DatabaseDir>,
        backend: Box<dyn StorageBackend>,
    ) -> CoreResult<Self> {
        let wal = WalManager::new(backend);
        let (table, last) = Self::recover(&wal, options.paranoid_checks)?;

        Ok(Self {
            comparator: options.comparator_or_default(),
            options,
            dir,
            wal,
            table: RwLock::new(table),
            write_lock: Mutex::new(()),
            last_sequence: AtomicU64::new(last.as_u64()),
            snapshots: Arc::new(SnapshotRegistry::default()),
            is_open: RwLock::new(true),
        })
    }

    /// Replays the log into a fresh table.
    ///
    /// Returns the table and the last sequence number found.
    fn recover(wal: &WalManager, paranoid: bool) -> CoreResult<(MemTable, SequenceNumber)> {
        let mut table = MemTable::new();
        let mut last = SequenceNumber::default();

        let recovery = wal.recover(paranoid, |frame| match table.apply(&frame.payload, last) {
            Ok(applied) => {
                if let Some(end) = applied.last() {
                    last = last.max(end);
                }
                Ok(())
            }
            Err(e) if paranoid => Err(CoreError::wal_corruption(format!(
                "undecodable batch at offset {}: {e}",
                frame.offset
            ))),
            Err(e) => {
                warn!(offset = frame.offset, error = %e, "skipping undecodable batch");
                Ok(())
            }
        })?;

        info!(
            frames = recovery.frames,
            last_sequence = last.as_u64(),
            discarded_bytes = recovery.discarded_bytes,
            "database opened"
        );
        Ok((table, last))
    }

    /// Commits `batch`. See [`BatchSubmitter::write`].
    ///
    /// An empty batch commits nothing and returns the latest sequence. A
    /// batch holding only log data is logged but consumes no sequence
    /// number, so the latest sequence is returned as well.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DatabaseClosed`] after [`close`](Self::close)
    /// - [`CoreError::Codec`] if the batch is malformed, its header count is
    ///   wrong or a record has an unknown tag; nothing is logged or applied
    /// - log write errors; nothing is applied
    ///
    /// On error the batch header is left as it was.
    pub fn write(&self, options: &WriteOptions, batch: &mut WriteBatch) -> CoreResult<SequenceNumber> {
        let _commit = self.write_lock.lock();
        self.ensure_open()?;

        let last = self.latest_sequence();
        if batch.is_empty() {
            return Ok(last);
        }

        let first = last.next();
        let previous = batch.sequence();
        batch.set_sequence(first.as_u64());
        let result = self.commit(options, batch, last);
        if result.is_err() {
            batch.set_sequence(previous);
        }
        result
    }

    /// Logs and applies a batch whose header already carries `last + 1`.
    /// Caller holds the write lock.
    fn commit(
        &self,
        options: &WriteOptions,
        batch: &WriteBatch,
        last: SequenceNumber,
    ) -> CoreResult<SequenceNumber> {
        let decoded = DecodedBatch::decode(batch.data())?;

        if !options.disable_wal {
            self.wal.append(batch.data(), options.sync)?;
        }

        let horizon = self.snapshots.oldest().map_or(last, |oldest| oldest.min(last));
        let applied = {
            let mut table = self.table.write();
            let applied = table.apply_decoded(&decoded, horizon);
            if let Some(end) = applied.last() {
                self.last_sequence.store(end.as_u64(), Ordering::Release);
            }
            applied
        };

        debug!(
            sequence = applied.first.as_u64(),
            records = applied.count,
            bytes = batch.size_in_bytes(),
            sync = options.sync,
            disable_wal = options.disable_wal,
            "batch committed"
        );

        Ok(if applied.count > 0 { applied.first } else { last })
    }

    /// Sets `key` to `value` in a batch of its own.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> CoreResult<SequenceNumber> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, &mut batch)
    }

    /// Removes `key` in a batch of its own.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> CoreResult<SequenceNumber> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, &mut batch)
    }

    /// Records a merge operand for `key` in a batch of its own.
    ///
    /// This engine has no merge operator: the operand replaces the value.
    ///
    /// # Errors
    ///
    /// See [`write`](Self::write).
    pub fn merge(&self, options: &WriteOptions, key: &[u8], operand: &[u8]) -> CoreResult<SequenceNumber> {
        let mut batch = WriteBatch::new();
        batch.merge(key, operand);
        self.write(options, &mut batch)
    }

    /// Reads `key` at the latest state, or at `options.snapshot`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DatabaseClosed`] after [`close`](Self::close)
    /// - [`CoreError::InvalidArgument`] for a snapshot of another database
    pub fn get(&self, options: &ReadOptions, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        let table = self.table.read();
        let at = self.read_sequence(options)?;
        Ok(table.get(key, at).map(<[u8]>::to_vec))
    }

    /// Returns a cursor over the keys visible at the latest state, or at
    /// `options.snapshot`, ordered by the configured comparator.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn iter(&self, options: &ReadOptions) -> CoreResult<DbIterator> {
        self.ensure_open()?;
        let entries = {
            let table = self.table.read();
            let at = self.read_sequence(options)?;
            table.visible_entries(at)
        };
        Ok(DbIterator::new(entries, self.comparator.clone()))
    }

    /// Pins the current state for later reads through
    /// [`ReadOptions::snapshot`]. Dropping every clone releases it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`close`](Self::close).
    pub fn snapshot(&self) -> CoreResult<Snapshot> {
        self.ensure_open()?;
        let _table = self.table.read();
        Ok(self.snapshots.acquire(self.latest_sequence()))
    }

    /// Sequence number of the last committed record.
    #[must_use]
    pub fn latest_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.last_sequence.load(Ordering::Acquire))
    }

    /// Number of live snapshots.
    #[must_use]
    pub fn num_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Approximate bytes of keys and values held in memory.
    #[must_use]
    pub fn approximate_memory_usage(&self) -> usize {
        self.table.read().approximate_size()
    }

    /// Options the database was opened with.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Directory path, for databases opened with [`open`](Self::open).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// Syncs the log and closes the database. Later calls return
    /// [`CoreError::DatabaseClosed`]. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails; the database stays open.
    pub fn close(&self) -> CoreResult<()> {
        let _commit = self.write_lock.lock();
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.wal.sync()?;
        *is_open = false;
        info!(last_sequence = self.latest_sequence().as_u64(), "database closed");
        Ok(())
    }

    /// True until [`close`](Self::close) succeeds.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    fn read_sequence(&self, options: &ReadOptions) -> CoreResult<SequenceNumber> {
        match &options.snapshot {
            Some(snapshot) if !snapshot.belongs_to(&self.snapshots) => Err(
                CoreError::invalid_argument("snapshot was taken from a different database"),
            ),
            Some(snapshot) => Ok(snapshot.sequence()),
            None => Ok(self.latest_sequence()),
        }
    }
}

impl BatchSubmitter for Database {
    fn write(&self, options: &WriteOptions, batch: &mut WriteBatch) -> CoreResult<SequenceNumber> {
        Database::write(self, options, batch)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("is_open", &self.is_open())
            .field("latest_sequence", &self.latest_sequence())
            .field("comparator", &self.comparator.name())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
