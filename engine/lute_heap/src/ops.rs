//! Value and table operations that need string content.
//!
//! Key hashing, probing, language-level equality/ordering, deep copy,
//! and display all have to resolve string handles to bytes, so they live
//! on [`Heap`] rather than on the table type itself.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use lute_value::{Entry, Key, KeyView, StampError, TableCursor, TableRef, Value};
use rustc_hash::{FxHashMap, FxHasher};

use crate::heap::Heap;

impl Heap {
    /// Resolve a key's string content for hashing and comparison.
    fn key_view(&self, key: Key) -> KeyView<'_> {
        match key {
            Key::Int(v) => KeyView::Int(v),
            Key::Real(bits) => KeyView::Real(bits),
            Key::Str(s) => KeyView::Str(self.str_bytes(s)),
        }
    }

    fn key_hash(&self, key: Key) -> u64 {
        let mut hasher = FxHasher::default();
        self.key_view(key).hash(&mut hasher);
        hasher.finish()
    }

    fn keys_equal(&self, a: Key, b: Key) -> bool {
        self.key_view(a) == self.key_view(b)
    }

    /// Locate `key` in `table`: `(bucket, Some(slot))` when present.
    fn probe(&self, table: TableRef, key: Key, hash: u64) -> (usize, Option<usize>) {
        let t = self.table(table);
        let bucket = t.bucket_of(hash);
        for (slot, entry) in t.entries(bucket).iter().enumerate() {
            if entry.hash == hash && self.keys_equal(entry.key, key) {
                return (bucket, Some(slot));
            }
        }
        (bucket, None)
    }

    /// Whether a key is present at all. Reads cannot tell an absent key
    /// from one set to `Null`; name-resolution paths can.
    pub fn table_contains(&self, table: TableRef, key: Key) -> bool {
        let hash = self.key_hash(key);
        matches!(self.probe(table, key, hash), (_, Some(_)))
    }

    /// Read a key; absent keys read as [`Value::Null`].
    pub fn table_get(&self, table: TableRef, key: Key) -> Value {
        let hash = self.key_hash(key);
        match self.probe(table, key, hash) {
            (bucket, Some(slot)) => self.table(table).entries(bucket)[slot].value,
            (_, None) => Value::Null,
        }
    }

    /// Write a key. Overwriting an existing key is not a structural
    /// mutation; inserting a new one is.
    pub fn table_set(&mut self, table: TableRef, key: Key, value: Value) {
        let hash = self.key_hash(key);
        match self.probe(table, key, hash) {
            (bucket, Some(slot)) => self.table_mut(table).overwrite(bucket, slot, value),
            (_, None) => {
                self.table_mut(table).insert(Entry { hash, key, value });
            }
        }
        self.barrier(value);
        if let Key::Str(s) = key {
            self.barrier(Value::Str(s));
        }
    }

    /// Remove a key, returning its value (`Null` if it was absent).
    pub fn table_delete(&mut self, table: TableRef, key: Key) -> Value {
        let hash = self.key_hash(key);
        match self.probe(table, key, hash) {
            (bucket, Some(slot)) => {
                let removed = self.table_mut(table).remove(bucket, slot);
                // The caller now holds the only visible reference.
                self.barrier(removed);
                removed
            }
            (_, None) => Value::Null,
        }
    }

    /// Start a `for-in` iteration: first key/value and a cursor.
    pub fn table_first(&self, table: TableRef) -> Option<(Value, Value, TableCursor)> {
        self.table(table)
            .first()
            .map(|(entry, cursor)| (entry.key.to_value(), entry.value, cursor))
    }

    /// Continue a `for-in` iteration.
    ///
    /// # Errors
    /// [`StampError`] if the table was structurally mutated since the
    /// cursor was issued.
    pub fn table_next(
        &self,
        table: TableRef,
        cursor: TableCursor,
    ) -> Result<Option<(Value, Value, TableCursor)>, StampError> {
        Ok(self
            .table(table)
            .next(cursor)?
            .map(|(entry, next)| (entry.key.to_value(), entry.value, next)))
    }

    // Equality and ordering

    /// Language-level equality: numeric by value, strings by byte
    /// content, tables and functions by identity, `Null` equal only to
    /// itself. Cross-kind comparisons are unequal.
    pub fn value_eq(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
                // Canonicalization makes mixed int/real equality exact.
                match (a, b) {
                    (Value::Int(x), Value::Int(y)) => x == y,
                    (Value::Real(x), Value::Real(y)) => x == y,
                    // One canonical int, one non-integral real.
                    _ => false,
                }
            }
            (Value::Str(x), Value::Str(y)) => self.str_bytes(x) == self.str_bytes(y),
            (Value::Table(x), Value::Table(y)) => x == y,
            (Value::Func(x), Value::Func(y)) => x == y,
            _ => false,
        }
    }

    /// Relational ordering: defined for numeric pairs and string pairs
    /// only; everything else is `None` (the comparison is a runtime
    /// error upstream).
    pub fn value_cmp(&self, a: Value, b: Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Some(x.cmp(&y)),
            (Value::Int(_) | Value::Real(_), Value::Int(_) | Value::Real(_)) => {
                let (x, y) = (a.as_real()?, b.as_real()?);
                x.partial_cmp(&y)
            }
            (Value::Str(x), Value::Str(y)) => Some(self.str_bytes(x).cmp(self.str_bytes(y))),
            _ => None,
        }
    }

    // Deep copy

    /// Copy a value graph. Aliasing is preserved *within* one copy
    /// operation — a sub-table shared twice in the source is copied once
    /// and shared twice in the result, and cycles terminate — but the
    /// copy shares nothing mutable with the source. Strings and code are
    /// immutable and therefore shared.
    pub fn deep_copy(&mut self, value: Value) -> Value {
        let mark = self.root_mark();
        let mut seen: FxHashMap<(usize, u32), TableRef> = FxHashMap::default();
        let result = self.copy_rec(value, &mut seen);
        self.root_truncate(mark);
        result
    }

    fn copy_rec(
        &mut self,
        value: Value,
        seen: &mut FxHashMap<(usize, u32), TableRef>,
    ) -> Value {
        let Value::Table(source) = value else {
            return value;
        };
        let id = (source.index(), source.generation());
        if let Some(&copy) = seen.get(&id) {
            return Value::Table(copy);
        }
        let copy = self.alloc_table();
        // Rooted for the duration of the copy: allocation below may run
        // an incremental collection step.
        self.root_push(Value::Table(copy));
        seen.insert(id, copy);

        let entries: Vec<Entry> = self.table(source).iter_entries().copied().collect();
        for entry in entries {
            let copied = self.copy_rec(entry.value, seen);
            self.table_set(copy, entry.key, copied);
        }
        Value::Table(copy)
    }

    // Display

    /// Human-readable rendering for the CLI and diagnostics.
    pub fn display(&self, value: Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Str(s) => String::from_utf8_lossy(self.str_bytes(s)).into_owned(),
            Value::Func(_) => "func".to_string(),
            Value::Table(t) => format!("[table: {} entries]", self.table(t).len()),
        }
    }

    /// Convenience: intern a Rust string as a string value.
    pub fn str_value(&mut self, text: &str) -> Value {
        Value::Str(self.alloc_str(text.as_bytes()))
    }

    /// Convenience: make a string key from bytes.
    pub fn str_key(&mut self, bytes: &[u8]) -> Key {
        Key::Str(self.alloc_str(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn heap_with_table() -> (Heap, TableRef) {
        let mut heap = Heap::new();
        let table = heap.alloc_table();
        heap.root_push(Value::Table(table));
        (heap, table)
    }

    #[test]
    fn set_get_delete_roundtrip() {
        let (mut heap, t) = heap_with_table();
        let k = heap.str_key(b"a");
        heap.table_set(t, k, Value::Int(1));
        assert_eq!(heap.table_get(t, k), Value::Int(1));
        assert_eq!(heap.table_delete(t, k), Value::Int(1));
        assert_eq!(heap.table_get(t, k), Value::Null);
    }

    #[test]
    fn distinct_str_refs_same_content_are_one_key() {
        let (mut heap, t) = heap_with_table();
        let k1 = heap.str_key(b"name");
        let k2 = heap.str_key(b"name");
        heap.table_set(t, k1, Value::Int(1));
        heap.table_set(t, k2, Value::Int(2));
        assert_eq!(heap.table(t).len(), 1);
        assert_eq!(heap.table_get(t, k1), Value::Int(2));
    }

    #[test]
    fn int_and_integral_real_are_one_key() {
        let (mut heap, t) = heap_with_table();
        heap.table_set(t, Key::Int(3), Value::Int(10));
        let Some(real_key) = Key::from_value(Value::real(3.0)) else {
            panic!("3.0 is a legal key");
        };
        assert_eq!(heap.table_get(t, real_key), Value::Int(10));
    }

    #[test]
    fn value_equality_and_ordering() {
        let mut heap = Heap::new();
        let a = heap.str_value("abc");
        let b = heap.str_value("abc");
        let c = heap.str_value("abd");
        heap.root_push(a);
        heap.root_push(b);
        heap.root_push(c);
        assert!(heap.value_eq(a, b));
        assert!(!heap.value_eq(a, c));
        assert_eq!(heap.value_cmp(a, c), Some(Ordering::Less));
        assert!(heap.value_eq(Value::Int(2), Value::Int(2)));
        assert_eq!(
            heap.value_cmp(Value::Int(1), Value::Real(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(heap.value_cmp(Value::Int(1), a), None);
        assert!(!heap.value_eq(Value::Int(0), Value::Null));
    }

    #[test]
    fn deep_copy_preserves_internal_aliasing_not_source_aliasing() {
        let (mut heap, outer) = heap_with_table();
        let shared = heap.alloc_table();
        heap.root_push(Value::Table(shared));
        let ka = heap.str_key(b"a");
        let kb = heap.str_key(b"b");
        let kx = heap.str_key(b"x");
        heap.table_set(shared, kx, Value::Int(1));
        heap.table_set(outer, ka, Value::Table(shared));
        heap.table_set(outer, kb, Value::Table(shared));

        let copy = heap.deep_copy(Value::Table(outer));
        heap.root_push(copy);
        let Value::Table(copy) = copy else {
            panic!("copy of a table is a table");
        };
        let (Value::Table(ca), Value::Table(cb)) =
            (heap.table_get(copy, ka), heap.table_get(copy, kb))
        else {
            panic!("copied entries are tables");
        };
        // Shared within the copy...
        assert_eq!(ca, cb);
        // ...but not with the source.
        assert_ne!(ca, shared);

        // Mutating the copy never touches the source's reachable set.
        heap.table_set(ca, kx, Value::Int(99));
        assert_eq!(heap.table_get(shared, kx), Value::Int(1));
    }

    #[test]
    fn deep_copy_handles_cycles() {
        let (mut heap, t) = heap_with_table();
        let k = heap.str_key(b"self");
        heap.table_set(t, k, Value::Table(t));
        let copy = heap.deep_copy(Value::Table(t));
        let Value::Table(copy) = copy else {
            panic!("copy of a table is a table");
        };
        let Value::Table(inner) = heap.table_get(copy, k) else {
            panic!("cycle entry is a table");
        };
        assert_eq!(inner, copy, "cycle points back into the copy");
    }
}
