//! Dynamic value representation for the Lute engine.
//!
//! A [`Value`] is one of: 64-bit integer, double-precision real, byte
//! string, compiled code (a permanent bytecode buffer plus an entry cell,
//! i.e. a closure), or table — plus [`Value::Null`], the "no value"
//! sentinel that runtime errors degrade to and that reads of absent table
//! keys produce.
//!
//! Heap kinds are referenced through generation-checked handles
//! ([`StrRef`], [`TableRef`], [`CodeRef`]); the owning stores live in
//! `lute_heap`. Operations that need to resolve string *content* (key
//! hashing, value equality, display) therefore live on the heap; this
//! crate holds the representation and everything that is content-free.
//!
//! # Numeric canonicalization
//!
//! [`Value::real`] demotes any real that is exactly representable as an
//! `i64` to [`Value::Int`]. Integers and integral reals are therefore
//! indistinguishable everywhere, including as table keys.

mod table;
mod value;

pub use table::{Entry, StampError, Table, TableCursor};
pub use value::{CodeRef, FuncValue, Key, KeyView, StrRef, TableRef, Value};
