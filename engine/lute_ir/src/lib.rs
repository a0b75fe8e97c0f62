//! Shared IR for the Lute engine: tokens and the flattened bytecode tree.
//!
//! Per the engine design:
//! - No `Box<Node>`; cells are addressed by [`NodeRef`] (a `u32` index
//!   relative to the owning buffer's start)
//! - One contiguous array per program unit for cache locality
//! - A sub-tree is relocatable by index translation alone, which is what
//!   makes function bodies extractable as closures without a linker step
//!
//! # Module Structure
//!
//! - `token`: lexical token types ([`Token`], [`TokenKind`])
//! - `node`: bytecode cell types ([`Node`], [`NodeKind`], [`Payload`])
//! - `arena`: the transient build arena and the compaction (rebase) step
//!   that produces permanent [`CodeBuffer`]s

mod arena;
mod node;
mod token;

pub use arena::{native_trampoline, CodeArena, CodeBuffer, UnitMark};
pub use node::{Node, NodeKind, NodeRef, Payload, StrSlice};
pub use token::{Token, TokenKind};
