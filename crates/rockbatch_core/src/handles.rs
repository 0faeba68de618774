//! Opaque handles passed through options into the engine.
//!
//! Each handle is a cheap, cloneable capability. Creating one is the only
//! setup; dropping the last clone releases it. Options store the handles and
//! hand them on without looking inside, with two exceptions in the
//! reference engine: the [`Comparator`] orders range iteration and a
//! [`Snapshot`] pins the sequence a read observes.

use crate::types::SequenceNumber;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Block cache handle.
#[derive(Debug, Clone)]
pub struct Cache {
    capacity: Arc<usize>,
}

impl Cache {
    /// Creates an LRU cache handle holding up to `capacity` bytes.
    #[must_use]
    pub fn new_lru(capacity: usize) -> Self {
        Self {
            capacity: Arc::new(capacity),
        }
    }

    /// Configured capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        *self.capacity
    }
}

type CompareFn = dyn Fn(&[u8], &[u8]) -> Ordering + Send + Sync;

/// Total order over keys.
///
/// A database must always be opened with a comparator of the same name as
/// the one that created it.
#[derive(Clone)]
pub struct Comparator {
    name: Arc<str>,
    compare: Arc<CompareFn>,
}

impl Comparator {
    /// Name of the default lexicographic comparator.
    pub const BYTEWISE: &'static str = "leveldb.BytewiseComparator";

    /// Creates a comparator from a name and an ordering function.
    pub fn new<F>(name: impl Into<Arc<str>>, compare: F) -> Self
    where
        F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            compare: Arc::new(compare),
        }
    }

    /// The default comparator: unsigned lexicographic byte order.
    #[must_use]
    pub fn bytewise() -> Self {
        Self::new(Self::BYTEWISE, |a: &[u8], b: &[u8]| a.cmp(b))
    }

    /// Comparator name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Orders two keys.
    #[must_use]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        (self.compare)(a, b)
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Self::bytewise()
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparator").field("name", &self.name).finish()
    }
}

/// Filter policy handle consulted by the storage engine when it builds
/// table filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    kind: Arc<FilterKind>,
}

#[derive(Debug, PartialEq, Eq)]
enum FilterKind {
    Bloom { bits_per_key: u32 },
}

impl FilterPolicy {
    /// A bloom filter policy using `bits_per_key` bits for each key.
    #[must_use]
    pub fn bloom(bits_per_key: u32) -> Self {
        Self {
            kind: Arc::new(FilterKind::Bloom { bits_per_key }),
        }
    }

    /// Bits per key for bloom policies.
    #[must_use]
    pub fn bits_per_key(&self) -> u32 {
        match *self.kind {
            FilterKind::Bloom { bits_per_key } => bits_per_key,
        }
    }

    /// Policy name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match *self.kind {
            FilterKind::Bloom { .. } => "rocksdb.BuiltinBloomFilter",
        }
    }
}

/// Environment handle: background thread pools and file-system access used
/// by the storage engine.
#[derive(Debug, Clone)]
pub struct Env {
    pools: Arc<Mutex<BackgroundPools>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BackgroundPools {
    low: usize,
    high: usize,
}

impl Env {
    /// The default environment: one low-priority and one high-priority
    /// background thread.
    #[must_use]
    pub fn default_env() -> Self {
        Self {
            pools: Arc::new(Mutex::new(BackgroundPools { low: 1, high: 1 })),
        }
    }

    /// Sets the size of the low-priority (compaction) pool. Shared by every
    /// clone of this handle.
    pub fn set_background_threads(&self, threads: usize) {
        self.pools.lock().low = threads;
    }

    /// Sets the size of the high-priority (flush) pool.
    pub fn set_high_priority_background_threads(&self, threads: usize) {
        self.pools.lock().high = threads;
    }

    /// Current `(low, high)` pool sizes.
    #[must_use]
    pub fn background_threads(&self) -> (usize, usize) {
        let pools = *self.pools.lock();
        (pools.low, pools.high)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::default_env()
    }
}

/// Informational logger handed to the storage engine.
///
/// The reference engine reports through `tracing` and only forwards this
/// handle. `level` is the most verbose level the storage engine should write
/// to its info log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLog {
    inner: Arc<InfoLogInner>,
}

#[derive(Debug, PartialEq, Eq)]
struct InfoLogInner {
    name: String,
    level: tracing::Level,
}

impl InfoLog {
    /// Creates a logger handle named `name` that records messages at
    /// `level` and above.
    pub fn new(name: impl Into<String>, level: tracing::Level) -> Self {
        Self {
            inner: Arc::new(InfoLogInner {
                name: name.into(),
                level,
            }),
        }
    }

    /// Logger name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Most verbose level written.
    #[must_use]
    pub fn level(&self) -> tracing::Level {
        self.inner.level
    }
}

/// A consistent read view of a database at a fixed sequence number.
///
/// Obtained from [`crate::Database::snapshot`]. The snapshot stays
/// registered with its database until the last clone is dropped; while it is
/// registered, the versions it can see are kept alive.
#[derive(Debug, Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

#[derive(Debug)]
struct SnapshotInner {
    sequence: SequenceNumber,
    registry: Arc<SnapshotRegistry>,
}

impl Snapshot {
    /// Sequence number this snapshot reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.inner.sequence
    }

    pub(crate) fn belongs_to(&self, registry: &Arc<SnapshotRegistry>) -> bool {
        Arc::ptr_eq(&self.inner.registry, registry)
    }
}

impl Drop for SnapshotInner {
    fn drop(&mut self) {
        self.registry.release(self.sequence);
    }
}

/// Live snapshots of one database, counted per sequence number.
#[derive(Debug, Default)]
pub(crate) struct SnapshotRegistry {
    live: Mutex<BTreeMap<SequenceNumber, usize>>,
}

impl SnapshotRegistry {
    pub(crate) fn acquire(self: &Arc<Self>, sequence: SequenceNumber) -> Snapshot {
        *self.live.lock().entry(sequence).or_insert(0) += 1;
        Snapshot {
            inner: Arc::new(SnapshotInner {
                sequence,
                registry: Arc::clone(self),
            }),
        }
    }

    fn release(&self, sequence: SequenceNumber) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                live.remove(&sequence);
            }
        }
    }

    /// Oldest sequence any live snapshot reads at.
    pub(crate) fn oldest(&self) -> Option<SequenceNumber> {
        self.live.lock().keys().next().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.lock().values().sum()
    }
}
