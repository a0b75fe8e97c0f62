//! Bytecode cells.
//!
//! A program unit is a flat array of fixed-size [`Node`] cells plus a byte
//! table for string payloads. Every link between cells is a [`NodeRef`]:
//! an index *relative to the owning buffer's start*, never an absolute
//! address. A sub-tree therefore stays valid when its buffer is copied or
//! sliced, which is how function bodies double as standalone closures.
//!
//! # Cell shapes
//!
//! Operands hang off a cell through [`Payload::Child`] and are chained
//! through `next`:
//!
//! - binary operators: child = left operand, `left.next` = right operand
//! - `Assign`: child = lvalue, `lvalue.next` = rhs
//! - `Index`: child = target, `target.next` = key expression (`.name`
//!   compiles to an `Index` with a string-literal key)
//! - `Call`: child = callee, then actual arguments chained by `next`
//! - `TableCons`: child = first [`NodeKind::TableEntry`]; each entry's
//!   child = key expression, `key.next` = value expression
//! - `Block`: child = first statement; statements chained by `next`
//! - `If`: child = condition, then-branch, optional else-branch
//! - `While`: child = condition, body
//! - `For`: child = init statement, condition, step statement, body
//! - `ForIn`: child = loop variable reference, table expression, body
//! - `Func`: payload carries the body entry plus parameter/slot counts
//! - `NativeCall`: the internal-call marker a native trampoline body uses

use std::fmt;

/// Index of a bytecode cell, relative to its owning buffer's start.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct NodeRef(u32);

impl NodeRef {
    /// "No node" sentinel (absent child, end of a sibling chain).
    pub const NONE: NodeRef = NodeRef(u32::MAX);

    /// Create a reference from a raw cell index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        NodeRef(index)
    }

    /// Index into the owning buffer.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` unless this is the [`NodeRef::NONE`] sentinel.
    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    /// Rebase against a buffer sliced off at `base`.
    ///
    /// The sentinel survives rebasing unchanged.
    #[inline]
    pub(crate) fn rebased(self, base: u32) -> NodeRef {
        if self.is_some() {
            NodeRef(self.0 - base)
        } else {
            NodeRef::NONE
        }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_some() {
            write!(f, "@{}", self.0)
        } else {
            write!(f, "@none")
        }
    }
}

/// A span into a buffer's byte table (string payload storage).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StrSlice {
    /// Byte offset relative to the owning buffer's byte table.
    pub pos: u32,
    pub len: u32,
}

/// Kind tag of one bytecode cell.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    // Literals
    IntLit,
    RealLit,
    StrLit,

    // Variable references
    /// Global lookup by name (payload: string slice).
    Global,
    /// Local lookup by slot (payload: integer slot).
    Local,

    // Expressions
    Assign,
    Index,
    Call,
    Func,
    NativeCall,
    TableCons,
    TableEntry,
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    Neg,

    // Statements
    ExprStmt,
    Block,
    If,
    While,
    For,
    ForIn,
    Break,
    Continue,
    Return,
}

/// Inline payload of a bytecode cell.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Payload {
    None,
    /// First child cell.
    Child(NodeRef),
    Int(i64),
    Real(f64),
    /// Byte-string payload (names, string literals).
    Str(StrSlice),
    /// Function literal header.
    Func {
        /// Body entry cell (statement list or a `NativeCall` cell).
        entry: NodeRef,
        /// Declared parameter count.
        params: u8,
        /// Total local slots, parameters included.
        slots: u8,
    },
    /// Native ("internal") function binding.
    Native {
        id: u16,
        min_args: u8,
        max_args: u8,
    },
}

/// One fixed-size bytecode cell.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Next sibling in the enclosing chain.
    pub next: NodeRef,
    pub payload: Payload,
}

impl Node {
    /// Create a cell with no sibling yet.
    #[inline]
    pub fn new(kind: NodeKind, payload: Payload) -> Self {
        Node {
            kind,
            next: NodeRef::NONE,
            payload,
        }
    }

    /// First child, or the sentinel for payload kinds without one.
    #[inline]
    pub fn child(&self) -> NodeRef {
        match self.payload {
            Payload::Child(c) => c,
            Payload::Func { entry, .. } => entry,
            _ => NodeRef::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sentinel_is_none() {
        assert!(!NodeRef::NONE.is_some());
        assert!(NodeRef::new(0).is_some());
    }

    #[test]
    fn rebase_preserves_sentinel() {
        assert_eq!(NodeRef::NONE.rebased(10), NodeRef::NONE);
        assert_eq!(NodeRef::new(12).rebased(10), NodeRef::new(2));
    }

    #[test]
    fn child_of_func_is_entry() {
        let n = Node::new(
            NodeKind::Func,
            Payload::Func {
                entry: NodeRef::new(7),
                params: 2,
                slots: 3,
            },
        );
        assert_eq!(n.child(), NodeRef::new(7));
        assert_eq!(Node::new(NodeKind::Break, Payload::None).child(), NodeRef::NONE);
    }
}
