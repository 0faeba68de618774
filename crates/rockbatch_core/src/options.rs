//! Database, read and write options.
//!
//! Option structs are plain configuration: builder-style setters, `Default`
//! values matching the storage engine's defaults, and `serde` support so a
//! configuration can be loaded from a file. Handles ([`Cache`],
//! [`Comparator`], [`FilterPolicy`], [`Env`], [`InfoLog`], [`Snapshot`]) are runtime
//! objects and are skipped by serialization.

use crate::error::{CoreError, CoreResult};
use crate::handles::{Cache, Comparator, Env, FilterPolicy, InfoLog, Snapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Block compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionType {
    /// Blocks are stored uncompressed.
    None,
    /// Snappy block compression.
    #[default]
    Snappy,
}

/// Compaction strategy of the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompactionStyle {
    /// Leveled compaction.
    #[default]
    Level,
    /// Universal (tiered) compaction.
    Universal,
}

/// Tuning for [`CompactionStyle::Universal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniversalCompactionOptions {
    /// Percentage size slack when picking files to merge.
    pub size_ratio: u32,
    /// Minimum number of files merged in one run.
    pub min_merge_width: u32,
    /// Maximum number of files merged in one run.
    pub max_merge_width: u32,
    /// Size amplification that triggers a full compaction, in percent.
    pub max_size_amplification_percent: u32,
}

impl Default for UniversalCompactionOptions {
    fn default() -> Self {
        Self {
            size_ratio: 1,
            min_merge_width: 2,
            max_merge_width: 16,
            // Trigger compaction if size amplification exceeds 110%
            max_size_amplification_percent: 110,
        }
    }
}

/// Options used when opening a database.
///
/// ```
/// use rockbatch_core::{Cache, FilterPolicy, Options};
///
/// let options = Options::new()
///     .create_if_missing(true)
///     .cache(Cache::new_lru(3 << 30))
///     .filter_policy(FilterPolicy::bloom(10));
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Create the database if it does not exist.
    pub create_if_missing: bool,
    /// Fail to open if the database already exists.
    pub error_if_exists: bool,
    /// Treat any detected corruption as fatal instead of skipping it.
    pub paranoid_checks: bool,
    /// Bytes buffered in memory before a flush to a sorted file.
    pub write_buffer_size: usize,
    /// Maximum number of in-memory write buffers.
    pub max_write_buffer_number: u32,
    /// Minimum number of write buffers merged before a flush.
    pub min_write_buffer_number_to_merge: u32,
    /// Maximum number of files kept open at once.
    pub max_open_files: i32,
    /// Approximate user data per block, uncompressed.
    pub block_size: usize,
    /// Keys between restart points for delta encoding.
    pub block_restart_interval: u32,
    /// Block compression.
    pub compression: CompressionType,
    /// Lowest level whose blocks are compressed; `-1` compresses every level.
    pub min_level_to_compress: i32,
    /// Compaction strategy.
    pub compaction_style: CompactionStyle,
    /// Universal compaction tuning, used when `compaction_style` is universal.
    pub universal_compaction: UniversalCompactionOptions,
    /// Concurrent background compactions.
    pub max_background_compactions: u32,
    /// Concurrent background flushes; zero shares the compaction pool.
    pub max_background_flushes: u32,
    /// Number of levels.
    pub num_levels: u32,
    /// Level-0 file count that starts a compaction.
    pub level0_file_num_compaction_trigger: u32,
    /// Level-0 file count that slows writes down.
    pub level0_slowdown_writes_trigger: u32,
    /// Level-0 file count that stops writes.
    pub level0_stop_writes_trigger: u32,
    /// Target file size for level 1.
    pub target_file_size_base: u64,
    /// Maximum total bytes for level 1.
    pub max_bytes_for_level_base: u64,
    /// Disable compactions triggered by seeks.
    pub disable_seek_compaction: bool,
    /// Back write buffers with a vector sorted on iteration.
    pub memtable_vector_rep: bool,
    /// Collect engine statistics.
    pub enable_statistics: bool,
    /// How often statistics are dumped to the info log.
    pub stats_dump_period: Duration,
    /// Block cache.
    #[serde(skip)]
    pub cache: Option<Cache>,
    /// Key comparator; bytewise when unset.
    #[serde(skip)]
    pub comparator: Option<Comparator>,
    /// Table filter policy.
    #[serde(skip)]
    pub filter_policy: Option<FilterPolicy>,
    /// Environment.
    #[serde(skip)]
    pub env: Option<Env>,
    /// Informational logger for the storage engine.
    #[serde(skip)]
    pub info_log: Option<InfoLog>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: true,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            min_write_buffer_number_to_merge: 1,
            max_open_files: 1000,
            block_size: 4 * 1024,
            block_restart_interval: 16,
            compression: CompressionType::Snappy,
            min_level_to_compress: -1,
            compaction_style: CompactionStyle::Level,
            universal_compaction: UniversalCompactionOptions::default(),
            max_background_compactions: 1,
            max_background_flushes: 0,
            num_levels: 7,
            level0_file_num_compaction_trigger: 4,
            level0_slowdown_writes_trigger: 20,
            level0_stop_writes_trigger: 24,
            target_file_size_base: 2 * 1024 * 1024,
            max_bytes_for_level_base: 10 * 1024 * 1024,
            disable_seek_compaction: false,
            memtable_vector_rep: false,
            enable_statistics: false,
            stats_dump_period: Duration::from_secs(3600),
            cache: None,
            comparator: None,
            filter_policy: None,
            env: None,
            info_log: None,
        }
    }
}

impl Options {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fail if the database exists.
    #[must_use]
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether corruption is fatal.
    #[must_use]
    pub fn paranoid_checks(mut self, value: bool) -> Self {
        self.paranoid_checks = value;
        self
    }

    /// Sets the write buffer size in bytes.
    #[must_use]
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Sets the maximum number of write buffers.
    #[must_use]
    pub fn max_write_buffer_number(mut self, n: u32) -> Self {
        self.max_write_buffer_number = n;
        self
    }

    /// Sets the minimum number of write buffers merged per flush.
    #[must_use]
    pub fn min_write_buffer_number_to_merge(mut self, n: u32) -> Self {
        self.min_write_buffer_number_to_merge = n;
        self
    }

    /// Sets the open file limit.
    #[must_use]
    pub fn max_open_files(mut self, n: i32) -> Self {
        self.max_open_files = n;
        self
    }

    /// Sets the block size in bytes.
    #[must_use]
    pub fn block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self
    }

    /// Sets the block restart interval.
    #[must_use]
    pub fn block_restart_interval(mut self, n: u32) -> Self {
        self.block_restart_interval = n;
        self
    }

    /// Sets block compression.
    #[must_use]
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the lowest compressed level.
    #[must_use]
    pub fn min_level_to_compress(mut self, level: i32) -> Self {
        self.min_level_to_compress = level;
        self
    }

    /// Sets the compaction style.
    ///
    /// Choosing [`CompactionStyle::Universal`] also resets
    /// [`universal_compaction`](Self::universal_compaction) to its defaults.
    #[must_use]
    pub fn compaction_style(mut self, style: CompactionStyle) -> Self {
        self.compaction_style = style;
        if style == CompactionStyle::Universal {
            self.universal_compaction = UniversalCompactionOptions::default();
        }
        self
    }

    /// Sets universal compaction tuning.
    #[must_use]
    pub fn universal_compaction(mut self, options: UniversalCompactionOptions) -> Self {
        self.universal_compaction = options;
        self
    }

    /// Sets the number of concurrent background compactions.
    #[must_use]
    pub fn max_background_compactions(mut self, n: u32) -> Self {
        self.max_background_compactions = n;
        self
    }

    /// Sets the number of concurrent background flushes.
    #[must_use]
    pub fn max_background_flushes(mut self, n: u32) -> Self {
        self.max_background_flushes = n;
        self
    }

    /// Sets the number of levels.
    #[must_use]
    pub fn num_levels(mut self, n: u32) -> Self {
        self.num_levels = n;
        self
    }

    /// Sets the level-0 compaction trigger.
    #[must_use]
    pub fn level0_file_num_compaction_trigger(mut self, n: u32) -> Self {
        self.level0_file_num_compaction_trigger = n;
        self
    }

    /// Sets the level-0 slowdown trigger.
    #[must_use]
    pub fn level0_slowdown_writes_trigger(mut self, n: u32) -> Self {
        self.level0_slowdown_writes_trigger = n;
        self
    }

    /// Sets the level-0 stop trigger.
    #[must_use]
    pub fn level0_stop_writes_trigger(mut self, n: u32) -> Self {
        self.level0_stop_writes_trigger = n;
        self
    }

    /// Sets the level-1 target file size.
    #[must_use]
    pub fn target_file_size_base(mut self, bytes: u64) -> Self {
        self.target_file_size_base = bytes;
        self
    }

    /// Sets the level-1 size budget.
    #[must_use]
    pub fn max_bytes_for_level_base(mut self, bytes: u64) -> Self {
        self.max_bytes_for_level_base = bytes;
        self
    }

    /// Sets whether seek-triggered compaction is disabled.
    #[must_use]
    pub fn disable_seek_compaction(mut self, value: bool) -> Self {
        self.disable_seek_compaction = value;
        self
    }

    /// Backs write buffers with a vector representation.
    #[must_use]
    pub fn memtable_vector_rep(mut self, value: bool) -> Self {
        self.memtable_vector_rep = value;
        self
    }

    /// Enables statistics collection.
    #[must_use]
    pub fn enable_statistics(mut self, value: bool) -> Self {
        self.enable_statistics = value;
        self
    }

    /// Sets the statistics dump period.
    #[must_use]
    pub fn stats_dump_period(mut self, period: Duration) -> Self {
        self.stats_dump_period = period;
        self
    }

    /// Sets the block cache.
    #[must_use]
    pub fn cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the key comparator.
    #[must_use]
    pub fn comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// Sets the filter policy.
    #[must_use]
    pub fn filter_policy(mut self, policy: FilterPolicy) -> Self {
        self.filter_policy = Some(policy);
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    /// Sets the storage engine's informational logger.
    #[must_use]
    pub fn info_log(mut self, log: InfoLog) -> Self {
        self.info_log = Some(log);
        self
    }

    /// The configured comparator, or the bytewise default.
    #[must_use]
    pub fn comparator_or_default(&self) -> Comparator {
        self.comparator.clone().unwrap_or_default()
    }

    /// Checks that the option values are consistent with each other.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] naming the first bad value.
    pub fn validate(&self) -> CoreResult<()> {
        if self.write_buffer_size == 0 {
            return Err(CoreError::invalid_argument("write_buffer_size must be positive"));
        }
        if self.max_write_buffer_number == 0 {
            return Err(CoreError::invalid_argument(
                "max_write_buffer_number must be at least 1",
            ));
        }
        if self.min_write_buffer_number_to_merge > self.max_write_buffer_number {
            return Err(CoreError::invalid_argument(format!(
                "min_write_buffer_number_to_merge ({}) exceeds max_write_buffer_number ({})",
                self.min_write_buffer_number_to_merge, self.max_write_buffer_number
            )));
        }
        if self.block_size == 0 {
            return Err(CoreError::invalid_argument("block_size must be positive"));
        }
        if self.block_restart_interval == 0 {
            return Err(CoreError::invalid_argument(
                "block_restart_interval must be at least 1",
            ));
        }
        if self.num_levels == 0 {
            return Err(CoreError::invalid_argument("num_levels must be at least 1"));
        }
        if i64::from(self.min_level_to_compress) >= i64::from(self.num_levels) {
            return Err(CoreError::invalid_argument(format!(
                "min_level_to_compress ({}) must be below num_levels ({})",
                self.min_level_to_compress, self.num_levels
            )));
        }
        if self.level0_file_num_compaction_trigger > self.level0_slowdown_writes_trigger
            || self.level0_slowdown_writes_trigger > self.level0_stop_writes_trigger
        {
            return Err(CoreError::invalid_argument(format!(
                "level-0 triggers must be ordered: compaction {} <= slowdown {} <= stop {}",
                self.level0_file_num_compaction_trigger,
                self.level0_slowdown_writes_trigger,
                self.level0_stop_writes_trigger
            )));
        }
        let universal = &self.universal_compaction;
        if universal.min_merge_width > universal.max_merge_width {
            return Err(CoreError::invalid_argument(format!(
                "universal min_merge_width ({}) exceeds max_merge_width ({})",
                universal.min_merge_width, universal.max_merge_width
            )));
        }
        Ok(())
    }
}

/// Options for reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Verify checksums of the data read.
    pub verify_checksums: bool,
    /// Populate the block cache with data read. Turn off for bulk scans so
    /// they do not evict live data.
    pub fill_cache: bool,
    /// Read as of this snapshot instead of the latest state.
    #[serde(skip)]
    pub snapshot: Option<Snapshot>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        }
    }
}

impl ReadOptions {
    /// Creates read options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets checksum verification.
    #[must_use]
    pub fn verify_checksums(mut self, value: bool) -> Self {
        self.verify_checksums = value;
        self
    }

    /// Sets whether reads fill the cache.
    #[must_use]
    pub fn fill_cache(mut self, value: bool) -> Self {
        self.fill_cache = value;
        self
    }

    /// Reads as of `snapshot`; `None` reads the latest state.
    #[must_use]
    pub fn snapshot(mut self, snapshot: Option<Snapshot>) -> Self {
        self.snapshot = snapshot;
        self
    }
}

/// Options for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WriteOptions {
    /// Sync the log to durable media before the write returns.
    pub sync: bool,
    /// Skip the write-ahead log; the write is lost on crash.
    pub disable_wal: bool,
}

impl WriteOptions {
    /// Creates write options with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sync: false,
            disable_wal: false,
        }
    }

    /// Sets whether each write is synced.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets whether the write-ahead log is bypassed.
    #[must_use]
    pub const fn disable_wal(mut self, value: bool) -> Self {
        self.disable_wal = value;
        self
    }
}
