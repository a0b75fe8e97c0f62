//! Tree-walking evaluator and embedding API for the Lute engine.
//!
//! [`Interpreter`] owns the heap, the globals table, the native-function
//! registry, and the call-frame stack. Source enters through
//! [`Interpreter::load`] (one top-level unit at a time, compiled to a
//! permanent code value) and executes through [`Interpreter::run`].
//!
//! # Error model
//!
//! Runtime errors (undefined variable, indexing a non-table, calling a
//! non-function, arity mismatch, native failure, table mutated during
//! iteration) are not Rust errors: the offending expression degrades to
//! [`Value::Null`] and a diagnostic flows through the configured
//! reporter, gated on verbosity and a per-run stack-trace budget.
//! `break`/`continue`/`return` unwind through typed flow signals,
//! distinct from the error path.
//!
//! # Re-entrancy
//!
//! A native that calls back into script code must pass
//! [`Reentry::Allowed`]; plain [`Interpreter::run`] while a run is in
//! progress is rejected with a diagnostic.

mod call;
mod exec;
pub mod stdlib;

#[cfg(test)]
mod tests;

use lute_diagnostic::{DiagConfig, Diagnostic, Emitter, Reporter};
use lute_heap::{Heap, RootMark};
use lute_ir::{native_trampoline, CodeBuffer, NodeRef};
use lute_parse::{NativeSig, Parser};
use lute_value::{CodeRef, FuncValue, Key, TableRef, Value};
use smallvec::SmallVec;

/// Entry point of a registered native function.
///
/// Arguments are rooted for the duration of the call; values the native
/// allocates and intends to keep across further allocations must be
/// rooted by the native itself. `Err` is reported as a runtime error and
/// the call degrades to `Null`.
pub type NativeFn = fn(&mut Interpreter, &[Value]) -> Result<Value, String>;

/// Whether a nested [`Interpreter::run`]/[`Interpreter::call`] is
/// permitted while a run is already in progress.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reentry {
    Forbidden,
    Allowed,
}

struct Native {
    sig: NativeSig,
    entry: NativeFn,
}

/// One script-function activation. Locals live on the heap root stack,
/// starting at `base`.
pub(crate) struct Frame {
    pub(crate) code: CodeRef,
    pub(crate) entry: NodeRef,
    pub(crate) base: RootMark,
}

/// A tail call unwinding toward the frame loop.
pub(crate) struct PendingCall {
    pub(crate) func: FuncValue,
    pub(crate) args: SmallVec<[Value; 8]>,
}

/// The interpreter context: heap, globals, natives, frames, diagnostics.
pub struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) globals: TableRef,
    /// Pins every loaded unit; code objects are permanent.
    registry: TableRef,
    loaded: i64,
    natives: Vec<Native>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) tail: Option<PendingCall>,
    reporter: Reporter,
    /// Stack-trace frames left to print this run.
    trace_left: usize,
    running: bool,
}

impl Interpreter {
    /// Interpreter reporting to stderr.
    pub fn new(config: DiagConfig) -> Self {
        Interpreter::with_emitter(config, Box::new(lute_diagnostic::StderrEmitter))
    }

    /// Interpreter with a custom diagnostic sink (embedders, tests).
    pub fn with_emitter(config: DiagConfig, emitter: Box<dyn Emitter>) -> Self {
        let mut heap = Heap::new();
        let globals = heap.alloc_table();
        heap.root_push(Value::Table(globals));
        let registry = heap.alloc_table();
        heap.root_push(Value::Table(registry));
        Interpreter {
            heap,
            globals,
            registry,
            loaded: 0,
            natives: Vec::new(),
            frames: Vec::new(),
            tail: None,
            reporter: Reporter::new(config, emitter),
            trace_left: 0,
            running: false,
        }
    }

    /// The heap, for host code that builds or inspects values.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Errors reported so far, parse and runtime alike.
    pub fn error_count(&self) -> usize {
        self.reporter.error_count()
    }

    // Natives

    /// Register a native function and bind it as a global of the same
    /// name (via a one-cell trampoline unit). Returns the dispatch id.
    pub fn register_native(
        &mut self,
        name: &str,
        min_args: u8,
        max_args: u8,
        entry: NativeFn,
    ) -> u16 {
        let id = self.natives.len() as u16;
        self.natives.push(Native {
            sig: NativeSig {
                name: name.to_string(),
                id,
                min_args,
                max_args,
            },
            entry,
        });
        let code = self.heap.alloc_code(native_trampoline(id, min_args, max_args));
        let entry_ref = self.heap.code(code).root();
        self.set_global(
            name,
            Value::Func(FuncValue {
                code,
                entry: entry_ref,
            }),
        );
        id
    }

    /// Signature table for constructing a [`Parser`] (the parser resolves
    /// `internal "name"` bindings against it).
    pub fn native_sigs(&self) -> Vec<NativeSig> {
        self.natives.iter().map(|n| n.sig.clone()).collect()
    }

    pub(crate) fn native_entry(&self, id: u16) -> Option<(NativeFn, &NativeSig)> {
        self.natives.get(id as usize).map(|n| (n.entry, &n.sig))
    }

    // Loading

    /// Parse the next unit from `parser` into a permanent code value.
    ///
    /// Returns `None` at end of input or on a parse error; parse errors
    /// are reported and leave the parser recovered at the next unit.
    pub fn load(&mut self, parser: &mut Parser<'_>) -> Option<Value> {
        match parser.parse_unit() {
            Ok(Some(buffer)) => Some(self.load_unit(buffer)),
            Ok(None) => None,
            Err(err) => {
                self.reporter.report(&err.to_diagnostic());
                None
            }
        }
    }

    /// Turn a compacted unit into a permanent, runnable code value.
    pub fn load_unit(&mut self, buffer: CodeBuffer) -> Value {
        let code = self.heap.alloc_code(buffer);
        let root = self.heap.code(code).root();
        let value = Value::Func(FuncValue { code, entry: root });
        let key = Key::Int(self.loaded);
        self.loaded += 1;
        self.heap.table_set(self.registry, key, value);
        value
    }

    // Running

    /// Execute a loaded code value. The unit's value is what its
    /// top-level `return` produced, `Null` otherwise.
    ///
    /// Returns `None` if `code` is not runnable or a run is already in
    /// progress (see [`Interpreter::run_with`]).
    pub fn run(&mut self, code: Value) -> Option<Value> {
        self.run_with(code, Reentry::Forbidden)
    }

    pub fn run_with(&mut self, code: Value, reentry: Reentry) -> Option<Value> {
        if !matches!(code, Value::Func(_)) {
            self.reporter
                .report(&Diagnostic::error("run: not a code value"));
            return None;
        }
        let was_running = self.enter(reentry)?;
        let span = tracing::debug_span!("unit", unit = self.loaded);
        let _guard = span.enter();
        let value = self.call_value(code, SmallVec::new());
        self.running = was_running;
        Some(value)
    }

    /// Invoke a function value from host code.
    pub fn call(&mut self, callee: Value, args: &[Value], reentry: Reentry) -> Option<Value> {
        let was_running = self.enter(reentry)?;
        let value = self.call_value(callee, SmallVec::from_slice(args));
        self.running = was_running;
        Some(value)
    }

    /// Invoke a global function by name (script handlers).
    pub fn call_by_name(&mut self, name: &str, args: &[Value]) -> Option<Value> {
        let callee = self.get_global(name);
        self.call(callee, args, Reentry::Forbidden)
    }

    /// Re-entrancy gate; resets the stack-trace budget on outermost
    /// entry. Returns the saved `running` flag.
    fn enter(&mut self, reentry: Reentry) -> Option<bool> {
        if self.running && reentry == Reentry::Forbidden {
            self.reporter.report(&Diagnostic::error(
                "re-entrant run rejected (pass Reentry::Allowed)",
            ));
            return None;
        }
        let was_running = std::mem::replace(&mut self.running, true);
        if !was_running {
            self.trace_left = self.reporter.config().max_trace_frames;
        }
        Some(was_running)
    }

    // Globals

    pub fn set_global(&mut self, name: &str, value: Value) {
        let mark = self.heap.root_mark();
        self.heap.root_push(value);
        let key = self.heap.str_key(name.as_bytes());
        self.heap.table_set(self.globals, key, value);
        self.heap.root_truncate(mark);
    }

    /// Read a global; absent reads as `Null` without a diagnostic (the
    /// host probes, scripts get "undefined variable" errors).
    pub fn get_global(&mut self, name: &str) -> Value {
        let key = self.heap.str_key(name.as_bytes());
        self.heap.table_get(self.globals, key)
    }

    // Error reporting

    /// Report a runtime error with as much call-stack context as the
    /// per-run trace budget still allows. The caller degrades the
    /// offending expression to `Null`.
    pub(crate) fn runtime_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(error = %message, depth = self.frames.len(), "runtime error");
        self.reporter.report(&Diagnostic::error(message));
        let printable = self.trace_left.min(self.frames.len());
        for (depth, frame) in self.frames.iter().rev().take(printable).enumerate() {
            self.reporter.report(&Diagnostic::note(format!(
                "frame #{}: code object {}, entry cell {:?}, locals at root depth {}",
                self.frames.len() - 1 - depth,
                frame.code.index(),
                frame.entry,
                frame.base.depth(),
            )));
        }
        self.trace_left -= printable;
    }
}
