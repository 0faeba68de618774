//! Database directory management.
//!
//! On-disk layout of a database:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ COMPARATOR        # Name of the comparator that orders the keys
//! └─ wal.log           # Batch write-ahead log
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const WAL_FILE: &str = "wal.log";
const COMPARATOR_FILE: &str = "COMPARATOR";
const COMPARATOR_TEMP: &str = "COMPARATOR.tmp";

/// A locked database directory.
///
/// Holds an exclusive advisory lock on `LOCK` for as long as it lives, so
/// only one `DatabaseDir` can exist per directory at a time.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens a database directory, creating it when `create_if_missing` is
    /// set.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidDatabase`] if the directory is missing and
    ///   `create_if_missing` is false, or the path is not a directory
    /// - [`CoreError::DatabaseLocked`] if another handle holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_database(format!(
                    "{} does not exist (create_if_missing is false)",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_database(format!(
                "{} is not a directory",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Root directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the write-ahead log.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }

    fn comparator_path(&self) -> PathBuf {
        self.path.join(COMPARATOR_FILE)
    }

    /// True when no database has been written here yet.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.wal_path().exists() && !self.comparator_path().exists()
    }

    /// Name of the comparator recorded at creation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load_comparator_name(&self) -> CoreResult<Option<String>> {
        match fs::read_to_string(self.comparator_path()) {
            Ok(name) => Ok(Some(name.trim_end().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Records the comparator name, replacing the file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_comparator_name(&self, name: &str) -> CoreResult<()> {
        let temp = self.path.join(COMPARATOR_TEMP);
        {
            let mut file = File::create(&temp)?;
            file.write_all(name.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&temp, self.comparator_path())?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
