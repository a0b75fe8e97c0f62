//! The heap: allocation, roots, and the incremental collector.
//!
//! # Collection algorithm
//!
//! Two area colors swap meaning at cycle start. Starting a cycle flips
//! `current`, marks every registered root into the new color, and queues
//! live tables gray. Marking proceeds breadth-first over table contents
//! (tables are the only heap kind that references other heap values) —
//! to exhaustion for [`Mode::Full`], or a bounded number of gray tables
//! per call for [`Mode::Incremental`]. When the gray queue drains, every
//! object still carrying the previous color is swept onto its store's
//! free list.
//!
//! Objects allocated while a cycle is in flight get the current color,
//! so they survive that cycle. Storing a value into a table (or a root
//! slot) while marking is active re-marks the value — the write barrier
//! that keeps incremental marking from losing a reachable object.
//!
//! # Roots
//!
//! The root stack is owned by the heap and is stack-disciplined:
//! [`Heap::root_mark`] / [`Heap::root_truncate`] bracket a lexical
//! region, [`Heap::root_push`] registers a value, and [`Heap::root_set`]
//! updates a slot whose target is reassigned in place (a local variable).
//! The evaluator's local-variable slots live directly in this stack.

use std::collections::VecDeque;

use lute_ir::CodeBuffer;
use lute_value::{CodeRef, StrRef, Table, TableRef, Value};
use smallvec::SmallVec;

use crate::store::{Color, Store};

/// Allocations between automatic incremental collection steps.
const ALLOC_TRIGGER: usize = 64;

/// Gray tables processed per incremental step.
const INCREMENTAL_STEP: usize = 8;

/// Collection mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Run the cycle to completion, including the sweep.
    Full,
    /// Advance the cycle by a bounded amount of marking work.
    Incremental,
}

/// Marker for a root-stack region, consumed by [`Heap::root_truncate`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RootMark(usize);

impl RootMark {
    /// Slot at a fixed offset above this mark (frame-local addressing:
    /// a frame's locals are the first slots pushed after its mark).
    #[inline]
    pub fn slot(self, index: usize) -> RootSlot {
        RootSlot(self.0 + index)
    }

    /// Root-stack depth this mark was taken at.
    #[inline]
    pub fn depth(self) -> usize {
        self.0
    }
}

/// One registered root slot, updatable in place via [`Heap::root_set`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RootSlot(usize);

impl RootSlot {
    /// Slot at a fixed offset above this one (frame-local addressing).
    #[inline]
    pub fn offset(self, slots: usize) -> RootSlot {
        RootSlot(self.0 + slots)
    }
}

/// Statistics from the most recent completed sweep.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepStats {
    pub strings: usize,
    pub tables: usize,
    pub code: usize,
}

/// The garbage-collected heap.
pub struct Heap {
    strings: Store<Box<[u8]>>,
    tables: Store<Table>,
    code: Store<CodeBuffer>,

    roots: Vec<Value>,
    current: Color,
    /// Gray queue; non-empty (or `marking`) means a cycle is in flight.
    gray: VecDeque<TableRef>,
    marking: bool,
    allocs_since_step: usize,
    last_sweep: SweepStats,
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            strings: Store::new(),
            tables: Store::new(),
            code: Store::new(),
            roots: Vec::new(),
            current: Color::White,
            gray: VecDeque::new(),
            marking: false,
            allocs_since_step: 0,
            last_sweep: SweepStats::default(),
        }
    }

    // Allocation

    /// Allocate an immutable byte string.
    pub fn alloc_str(&mut self, bytes: &[u8]) -> StrRef {
        self.maybe_step();
        let (index, gen) = self.strings.alloc(bytes.into(), self.current);
        StrRef::new(index, gen)
    }

    /// Allocate an empty table.
    pub fn alloc_table(&mut self) -> TableRef {
        self.maybe_step();
        let (index, gen) = self.tables.alloc(Table::new(), self.current);
        TableRef::new(index, gen)
    }

    /// Make a compacted unit permanent.
    pub fn alloc_code(&mut self, buffer: CodeBuffer) -> CodeRef {
        self.maybe_step();
        let (index, gen) = self.code.alloc(buffer, self.current);
        CodeRef::new(index, gen)
    }

    /// Opportunistic incremental work, run *before* the allocation so a
    /// brand-new object can never be swept in the same call.
    fn maybe_step(&mut self) {
        self.allocs_since_step += 1;
        if self.allocs_since_step >= ALLOC_TRIGGER {
            self.allocs_since_step = 0;
            self.collect(Mode::Incremental);
        }
    }

    // Dereference

    pub fn str_bytes(&self, s: StrRef) -> &[u8] {
        self.strings.get(s.index(), s.generation())
    }

    pub fn table(&self, t: TableRef) -> &Table {
        self.tables.get(t.index(), t.generation())
    }

    pub(crate) fn table_mut(&mut self, t: TableRef) -> &mut Table {
        self.tables.get_mut(t.index(), t.generation())
    }

    pub fn code(&self, c: CodeRef) -> &CodeBuffer {
        self.code.get(c.index(), c.generation())
    }

    /// Live object counts `(strings, tables, code)`.
    pub fn live_counts(&self) -> (usize, usize, usize) {
        (self.strings.live(), self.tables.live(), self.code.live())
    }

    /// Statistics from the most recent completed sweep.
    pub fn last_sweep(&self) -> SweepStats {
        self.last_sweep
    }

    /// Whether a marking cycle is currently in flight.
    pub fn gc_active(&self) -> bool {
        self.marking
    }

    // Roots

    /// Record the current root-stack depth.
    pub fn root_mark(&self) -> RootMark {
        RootMark(self.roots.len())
    }

    /// Register a root. Must be released (via [`Heap::root_truncate`] of
    /// an enclosing mark) in stack order.
    pub fn root_push(&mut self, value: Value) -> RootSlot {
        let slot = RootSlot(self.roots.len());
        self.roots.push(value);
        self.barrier(value);
        slot
    }

    /// Read a root slot.
    pub fn root_get(&self, slot: RootSlot) -> Value {
        self.roots[slot.0]
    }

    /// Reassign a root slot in place.
    pub fn root_set(&mut self, slot: RootSlot, value: Value) {
        self.roots[slot.0] = value;
        self.barrier(value);
    }

    /// Release every root registered since `mark`.
    pub fn root_truncate(&mut self, mark: RootMark) {
        debug_assert!(mark.0 <= self.roots.len(), "root marks must nest");
        self.roots.truncate(mark.0);
    }

    /// Number of registered roots (tests, trace output).
    pub fn root_depth(&self) -> usize {
        self.roots.len()
    }

    // Collection

    /// Run a collection step or a whole cycle.
    pub fn collect(&mut self, mode: Mode) {
        if !self.marking {
            self.start_cycle();
        }
        match mode {
            Mode::Full => {
                while self.marking {
                    self.step(usize::MAX);
                }
            }
            Mode::Incremental => {
                self.step(INCREMENTAL_STEP);
            }
        }
    }

    /// Flip areas and mark the root set.
    fn start_cycle(&mut self) {
        self.current = self.current.flip();
        self.marking = true;
        let roots: SmallVec<[Value; 16]> = self.roots.iter().copied().collect();
        for value in roots {
            self.mark_value(value);
        }
    }

    /// Process up to `budget` gray tables; sweep when marking completes.
    fn step(&mut self, budget: usize) {
        let mut processed = 0;
        while processed < budget {
            let Some(table) = self.gray.pop_front() else {
                break;
            };
            // Copy the entries out first: marking their values needs
            // mutable access to the other stores.
            let contents: SmallVec<[(Value, Value); 16]> = self
                .table(table)
                .iter_entries()
                .map(|e| (e.key.to_value(), e.value))
                .collect();
            for (key, value) in contents {
                self.mark_value(key);
                self.mark_value(value);
            }
            processed += 1;
        }
        if self.gray.is_empty() {
            self.sweep();
        }
    }

    /// Mark one value into the current area; gray tables for traversal.
    fn mark_value(&mut self, value: Value) {
        match value {
            Value::Null | Value::Int(_) | Value::Real(_) => {}
            Value::Str(s) => {
                self.strings.mark(s.index(), s.generation(), self.current);
            }
            Value::Func(f) => {
                self.code
                    .mark(f.code.index(), f.code.generation(), self.current);
            }
            Value::Table(t) => {
                if self.tables.mark(t.index(), t.generation(), self.current) {
                    self.gray.push_back(t);
                }
            }
        }
    }

    /// Write barrier: while marking is active, a value stored into a
    /// table or root slot is re-marked so incremental collection cannot
    /// miss it.
    pub(crate) fn barrier(&mut self, value: Value) {
        if self.marking {
            self.mark_value(value);
        }
    }

    /// Free everything still tagged with the previous area color.
    fn sweep(&mut self) {
        self.last_sweep = SweepStats {
            strings: self.strings.sweep(self.current),
            tables: self.tables.sweep(self.current),
            code: self.code.sweep(self.current),
        };
        self.marking = false;
    }
}
