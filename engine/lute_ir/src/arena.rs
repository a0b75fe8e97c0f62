//! The transient build arena and unit compaction.
//!
//! The parser (and the native-trampoline builder) append cells to a
//! [`CodeArena`] while a top-level unit is under construction. References
//! held during building are absolute indices into the arena. When the unit
//! parses cleanly it is *compacted*: its cell range and byte range are
//! sliced out and copied into an immutable [`CodeBuffer`] with every
//! reference translated to the new buffer's own zero point. On a syntax
//! error the arena is instead reset to the unit's entry mark and the cells
//! are discarded.
//!
//! Compaction is the only place references are rewritten; closures reuse
//! the compacted buffer as-is with a different entry cell.

use crate::node::{Node, NodeKind, NodeRef, Payload, StrSlice};

/// Snapshot of arena fill level at the start of a unit.
///
/// Taken with [`CodeArena::mark`]; consumed by [`CodeArena::compact`] on
/// success or [`CodeArena::reset_to`] on a parse error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnitMark {
    node: u32,
    byte: u32,
}

/// Append-only arena of bytecode cells plus their string bytes.
#[derive(Debug, Default)]
pub struct CodeArena {
    nodes: Vec<Node>,
    bytes: Vec<u8>,
}

impl CodeArena {
    pub fn new() -> Self {
        CodeArena::default()
    }

    /// Record the start of a new unit.
    pub fn mark(&self) -> UnitMark {
        UnitMark {
            node: self.nodes.len() as u32,
            byte: self.bytes.len() as u32,
        }
    }

    /// Discard everything appended since `mark` (failed unit).
    pub fn reset_to(&mut self, mark: UnitMark) {
        self.nodes.truncate(mark.node as usize);
        self.bytes.truncate(mark.byte as usize);
    }

    /// Append a cell, returning its absolute reference.
    pub fn push(&mut self, node: Node) -> NodeRef {
        let at = NodeRef::new(self.nodes.len() as u32);
        self.nodes.push(node);
        at
    }

    /// Copy `bytes` into the byte table, returning its slice descriptor.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> StrSlice {
        let pos = self.bytes.len() as u32;
        self.bytes.extend_from_slice(bytes);
        StrSlice {
            pos,
            len: bytes.len() as u32,
        }
    }

    /// Read a cell.
    ///
    /// # Panics
    /// On the `NONE` sentinel or an out-of-range reference. Both indicate
    /// an engine bug, never a user error.
    pub fn node(&self, at: NodeRef) -> &Node {
        &self.nodes[at.index()]
    }

    /// Chain `next` as the following sibling of `at`.
    pub fn set_next(&mut self, at: NodeRef, next: NodeRef) {
        self.nodes[at.index()].next = next;
    }

    /// Attach `child` as the first child of `at`.
    ///
    /// # Panics
    /// If the cell's payload kind cannot carry a child.
    pub fn set_child(&mut self, at: NodeRef, child: NodeRef) {
        let node = &mut self.nodes[at.index()];
        match &mut node.payload {
            Payload::Child(c) => *c = child,
            Payload::Func { entry, .. } => *entry = child,
            other => panic!("cell payload {other:?} cannot hold a child"),
        }
    }

    /// Number of cells currently in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Slice the unit built since `mark` out of the arena and copy it into
    /// a standalone buffer, translating every reference to the new zero
    /// point. `root` is the unit's entry cell (an absolute reference);
    /// `slots` the unit's top-level local slot count.
    ///
    /// The arena is reset to `mark` afterwards; the transient cells are
    /// owned by the returned buffer from here on.
    pub fn compact(&mut self, mark: UnitMark, root: NodeRef, slots: u16) -> CodeBuffer {
        let base = mark.node;
        let byte_base = mark.byte;
        let nodes = self.nodes[mark.node as usize..]
            .iter()
            .map(|node| rebase_node(node, base, byte_base))
            .collect();
        let bytes = self.bytes[mark.byte as usize..].to_vec();
        self.reset_to(mark);
        CodeBuffer {
            nodes,
            bytes,
            root: root.rebased(base),
            slots,
        }
    }
}

/// Translate one cell's references against a slice base.
fn rebase_node(node: &Node, base: u32, byte_base: u32) -> Node {
    let payload = match node.payload {
        Payload::Child(c) => Payload::Child(c.rebased(base)),
        Payload::Func {
            entry,
            params,
            slots,
        } => Payload::Func {
            entry: entry.rebased(base),
            params,
            slots,
        },
        Payload::Str(s) => Payload::Str(StrSlice {
            pos: s.pos - byte_base,
            len: s.len,
        }),
        other => other,
    };
    Node {
        kind: node.kind,
        next: node.next.rebased(base),
        payload,
    }
}

/// An immutable, self-contained program unit.
///
/// All references inside are relative to this buffer's own start, so the
/// buffer can be moved into the garbage-collected heap (or a sub-tree
/// entered at a different cell, for closures) with no further rewriting.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeBuffer {
    nodes: Vec<Node>,
    bytes: Vec<u8>,
    root: NodeRef,
    slots: u16,
}

impl CodeBuffer {
    /// The unit's entry cell.
    pub fn root(&self) -> NodeRef {
        self.root
    }

    /// Local slots needed to execute the unit at top level.
    pub fn slots(&self) -> u16 {
        self.slots
    }

    /// Read a cell.
    ///
    /// # Panics
    /// On the `NONE` sentinel or an out-of-range reference (engine bug).
    pub fn node(&self, at: NodeRef) -> &Node {
        &self.nodes[at.index()]
    }

    /// Resolve a string payload to its bytes.
    pub fn str_bytes(&self, slice: StrSlice) -> &[u8] {
        &self.bytes[slice.pos as usize..(slice.pos + slice.len) as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build a one-cell trampoline unit for a native function.
///
/// The unit is a function literal whose body is a single internal-call
/// marker; calling it through the ordinary call path dispatches straight
/// into the native table.
pub fn native_trampoline(id: u16, min_args: u8, max_args: u8) -> CodeBuffer {
    let mut arena = CodeArena::new();
    let mark = arena.mark();
    let call = arena.push(Node::new(
        NodeKind::NativeCall,
        Payload::Native {
            id,
            min_args,
            max_args,
        },
    ));
    let func = arena.push(Node::new(
        NodeKind::Func,
        Payload::Func {
            entry: call,
            params: max_args,
            slots: max_args,
        },
    ));
    arena.compact(mark, func, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compact_rebases_refs_and_bytes() {
        let mut arena = CodeArena::new();
        // A previous unit occupies the front of the arena.
        arena.push(Node::new(NodeKind::Break, Payload::None));
        arena.push_bytes(b"junk");

        let mark = arena.mark();
        let name = arena.push_bytes(b"answer");
        let lit = arena.push(Node::new(NodeKind::IntLit, Payload::Int(42)));
        let var = arena.push(Node::new(NodeKind::Global, Payload::Str(name)));
        arena.set_next(var, lit);
        let assign = arena.push(Node::new(NodeKind::Assign, Payload::Child(var)));

        let buf = arena.compact(mark, assign, 0);
        assert_eq!(arena.len(), 1, "arena reset to the previous unit");

        let root = buf.node(buf.root());
        assert_eq!(root.kind, NodeKind::Assign);
        let var = buf.node(root.child());
        assert_eq!(var.kind, NodeKind::Global);
        let Payload::Str(slice) = var.payload else {
            panic!("expected string payload");
        };
        assert_eq!(buf.str_bytes(slice), b"answer");
        let lit = buf.node(var.next);
        assert_eq!(lit.payload, Payload::Int(42));
        assert_eq!(lit.next, NodeRef::NONE);
    }

    #[test]
    fn reset_discards_failed_unit() {
        let mut arena = CodeArena::new();
        let mark = arena.mark();
        arena.push(Node::new(NodeKind::Break, Payload::None));
        arena.push_bytes(b"abc");
        arena.reset_to(mark);
        assert!(arena.is_empty());
    }

    #[test]
    fn trampoline_shape() {
        let buf = native_trampoline(3, 1, 2);
        let func = buf.node(buf.root());
        assert_eq!(func.kind, NodeKind::Func);
        let body = buf.node(func.child());
        assert_eq!(body.kind, NodeKind::NativeCall);
        assert_eq!(
            body.payload,
            Payload::Native {
                id: 3,
                min_args: 1,
                max_args: 2
            }
        );
    }
}
