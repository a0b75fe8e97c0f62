//! The table representation.
//!
//! An open-hashed associative container: a vector of buckets, each a
//! short vector of entries. The *content* of string keys lives in the
//! heap, so probing (hash + equality against a candidate key) is driven
//! from `lute_heap`; this module owns bucket placement, growth, the
//! modification stamp, and cursors.
//!
//! Invariants:
//! - keys are unique within one table
//! - iteration order is bucket order and carries no semantics
//! - `stamp` increases on every structural mutation (insert, delete,
//!   growth); in-place value overwrite is not structural

use crate::value::{Key, Value};

/// Initial bucket count.
const INITIAL_BUCKETS: usize = 8;

/// Grow when `len > LOAD_FACTOR * buckets`.
const LOAD_FACTOR: usize = 2;

/// One key/value slot. The key's hash is cached so growth can
/// redistribute entries without resolving string content again.
#[derive(Copy, Clone, Debug)]
pub struct Entry {
    pub hash: u64,
    pub key: Key,
    pub value: Value,
}

/// Cursor for ordered iteration (`first`/`next`), validated against the
/// table's modification stamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableCursor {
    bucket: usize,
    slot: usize,
    stamp: u64,
}

/// The table was structurally mutated while a cursor was live.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StampError;

impl std::fmt::Display for StampError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "table changed during iteration")
    }
}

impl std::error::Error for StampError {}

/// An open-hashed table.
#[derive(Clone, Debug)]
pub struct Table {
    buckets: Vec<Vec<Entry>>,
    len: usize,
    stamp: u64,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table {
            buckets: vec![Vec::new(); INITIAL_BUCKETS],
            len: 0,
            stamp: 0,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current modification stamp.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Bucket index a hash lands in.
    pub fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) % self.buckets.len()
    }

    /// Entries of one bucket.
    pub fn entries(&self, bucket: usize) -> &[Entry] {
        &self.buckets[bucket]
    }

    /// Every entry, in iteration (bucket) order.
    pub fn iter_entries(&self) -> impl Iterator<Item = &Entry> {
        self.buckets.iter().flatten()
    }

    /// Overwrite the value of an existing entry. Not structural: the
    /// stamp is unchanged and live cursors stay valid.
    pub fn overwrite(&mut self, bucket: usize, slot: usize, value: Value) {
        self.buckets[bucket][slot].value = value;
    }

    /// Insert a new entry whose key is known to be absent. Grows and
    /// redistributes first when the load factor is exceeded; returns
    /// `true` if growth happened (bucket indices are invalidated).
    pub fn insert(&mut self, entry: Entry) -> bool {
        let grew = if self.len + 1 > LOAD_FACTOR * self.buckets.len() {
            self.grow();
            true
        } else {
            false
        };
        let bucket = self.bucket_of(entry.hash);
        self.buckets[bucket].push(entry);
        self.len += 1;
        self.stamp += 1;
        grew
    }

    /// Remove one entry, returning its value.
    pub fn remove(&mut self, bucket: usize, slot: usize) -> Value {
        let entry = self.buckets[bucket].swap_remove(slot);
        self.len -= 1;
        self.stamp += 1;
        entry.value
    }

    /// Double the bucket count and redistribute by cached hash.
    fn grow(&mut self) {
        let new_count = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, vec![Vec::new(); new_count]);
        for entry in old.into_iter().flatten() {
            let bucket = (entry.hash as usize) % new_count;
            self.buckets[bucket].push(entry);
        }
    }

    /// Start iterating. Returns the first entry and a cursor, or `None`
    /// for an empty table.
    pub fn first(&self) -> Option<(Entry, TableCursor)> {
        self.scan_from(0, 0)
    }

    /// Continue iterating.
    ///
    /// # Errors
    /// [`StampError`] if the table was structurally mutated since the
    /// cursor was issued (fail-fast, per the iteration contract).
    pub fn next(&self, cursor: TableCursor) -> Result<Option<(Entry, TableCursor)>, StampError> {
        if cursor.stamp != self.stamp {
            return Err(StampError);
        }
        Ok(self.scan_from(cursor.bucket, cursor.slot + 1))
    }

    fn scan_from(&self, mut bucket: usize, mut slot: usize) -> Option<(Entry, TableCursor)> {
        while bucket < self.buckets.len() {
            if let Some(entry) = self.buckets[bucket].get(slot) {
                return Some((
                    *entry,
                    TableCursor {
                        bucket,
                        slot,
                        stamp: self.stamp,
                    },
                ));
            }
            bucket += 1;
            slot = 0;
        }
        None
    }
}
