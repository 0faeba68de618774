//! Range iteration over a database view.

use crate::handles::Comparator;
use std::cmp::Ordering;

/// Cursor over the live keys of a database at one sequence number.
///
/// The view is materialized when the iterator is created, so later writes
/// never show up in it. Keys are ordered by the database comparator. A new
/// iterator is not positioned; call [`seek_to_first`](Self::seek_to_first),
/// [`seek_to_last`](Self::seek_to_last) or [`seek`](Self::seek) first.
///
/// ```
/// use rockbatch_core::{Database, Options, ReadOptions, WriteOptions};
///
/// let db = Database::open_in_memory(Options::default()).unwrap();
/// db.put(&WriteOptions::default(), b"b", b"2").unwrap();
/// db.put(&WriteOptions::default(), b"a", b"1").unwrap();
///
/// let mut iter = db.iter(&ReadOptions::default()).unwrap();
/// iter.seek_to_first();
/// let mut keys = Vec::new();
/// while iter.valid() {
///     keys.push(iter.key().unwrap().to_vec());
///     iter.next();
/// }
/// assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
/// ```
pub struct DbIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    comparator: Comparator,
    position: Option<usize>,
}

impl DbIterator {
    pub(crate) fn new(mut entries: Vec<(Vec<u8>, Vec<u8>)>, comparator: Comparator) -> Self {
        entries.sort_by(|a, b| comparator.compare(&a.0, &b.0));
        Self {
            entries,
            comparator,
            position: None,
        }
    }

    /// True when positioned on an entry.
    #[must_use]
    pub fn valid(&self) -> bool {
        self.position.is_some()
    }

    /// Positions on the first key.
    pub fn seek_to_first(&mut self) {
        self.position = (!self.entries.is_empty()).then_some(0);
    }

    /// Positions on the last key.
    pub fn seek_to_last(&mut self) {
        self.position = self.entries.len().checked_sub(1);
    }

    /// Positions on the first key at or after `target`.
    pub fn seek(&mut self, target: &[u8]) {
        let index = self
            .entries
            .partition_point(|(key, _)| self.comparator.compare(key, target) == Ordering::Less);
        self.position = (index < self.entries.len()).then_some(index);
    }

    /// Moves to the next key. Past the last key the iterator becomes invalid.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        self.position = self
            .position
            .map(|i| i + 1)
            .filter(|&i| i < self.entries.len());
    }

    /// Moves to the previous key. Before the first key the iterator becomes
    /// invalid.
    pub fn prev(&mut self) {
        self.position = self.position.and_then(|i| i.checked_sub(1));
    }

    /// Key at the current position.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.position.map(|i| self.entries[i].0.as_slice())
    }

    /// Value at the current position.
    #[must_use]
    pub fn value(&self) -> Option<&[u8]> {
        self.position.map(|i| self.entries[i].1.as_slice())
    }

    /// Number of keys in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the view holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for DbIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbIterator")
            .field("len", &self.entries.len())
            .field("position", &self.position)
            .field("comparator", &self.comparator.name())
            .finish()
    }
}
