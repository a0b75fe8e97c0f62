//! Memory manager for the Lute engine.
//!
//! A handle-based heap with one owning store per value kind (byte
//! strings, tables, compiled code), an explicit root-registration stack,
//! and a two-color incremental mark-sweep collector. Callers never free
//! objects; they register and release roots while values are live in
//! their hands, and the collector reclaims everything unreachable from
//! the root set.
//!
//! # Module Structure
//!
//! - `store`: the generation-checked slot stores and area colors
//! - `heap`: allocation, roots, and the collection cycle
//! - `ops`: table and value operations that resolve string content
//!   (get/set/delete, iteration cursors, equality, ordering, deep copy,
//!   display)

mod heap;
mod ops;
mod store;

pub use heap::{Heap, Mode, RootMark, RootSlot, SweepStats};
pub use store::Color;
