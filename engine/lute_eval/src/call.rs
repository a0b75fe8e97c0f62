//! The call protocol.
//!
//! Script calls validate the actual count against the declared
//! parameter count, push a frame, root the callee's local slots
//! (parameters first, the rest `Null`), and execute the body. A tail call
//! (`return f(...)`) unwinds back to this loop and replaces the frame
//! instead of recursing, so mutually tail-recursive script functions run
//! in bounded native stack. Native-bodied functions validate the
//! declared arity range and dispatch by id.

use lute_ir::{NodeKind, Payload};
use lute_value::Value;
use smallvec::SmallVec;
use tracing::trace;

use crate::exec::{Env, Flow};
use crate::{Frame, Interpreter};

/// Frame-stack depth limit; beyond it calls degrade to `Null` with a
/// runtime error instead of exhausting segmented stacks.
const MAX_FRAMES: usize = 10_000;

impl Interpreter {
    /// Evaluate the callee and actuals of a `Call` cell, left to right,
    /// each rooted while the rest evaluate.
    pub(crate) fn eval_call_parts(
        &mut self,
        env: Env,
        call: lute_ir::NodeRef,
    ) -> (Value, SmallVec<[Value; 8]>) {
        let callee_ref = match self.heap.code(env.code).node(call).payload {
            Payload::Child(child) => child,
            ref other => unreachable!("call cell payload: {other:?}"),
        };
        let callee = self.eval(env, callee_ref);
        let mark = self.heap.root_mark();
        self.heap.root_push(callee);
        let mut argc = 0usize;
        let mut at = self.heap.code(env.code).node(callee_ref).next;
        while at.is_some() {
            let value = self.eval(env, at);
            self.heap.root_push(value);
            argc += 1;
            at = self.heap.code(env.code).node(at).next;
        }
        let args = (0..argc)
            .map(|i| self.heap.root_get(mark.slot(1 + i)))
            .collect();
        self.heap.root_truncate(mark);
        (callee, args)
    }

    /// Call a value. Non-functions degrade to `Null` with a runtime
    /// error; this is the single entry point for script calls, host
    /// calls, and unit execution.
    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        mut args: SmallVec<[Value; 8]>,
    ) -> Value {
        let Value::Func(mut func) = callee else {
            self.runtime_error(format!(
                "calling a non-function ({})",
                callee.type_name()
            ));
            return Value::Null;
        };
        loop {
            // A function-literal cell carries its header; a loaded unit's
            // root is a bare statement, with the slot count on the buffer.
            let buffer = self.heap.code(func.code);
            let (entry, params, slots) = match buffer.node(func.entry).payload {
                Payload::Func {
                    entry,
                    params,
                    slots,
                } => (entry, params as usize, slots as usize),
                _ => (func.entry, 0, buffer.slots() as usize),
            };

            let entry_node = *self.heap.code(func.code).node(entry);
            if entry_node.kind == NodeKind::NativeCall {
                return self.dispatch_native(entry_node.payload, &args);
            }

            if args.len() != params {
                self.runtime_error(format!(
                    "wrong number of arguments: expected {params}, got {}",
                    args.len()
                ));
                return Value::Null;
            }
            if self.frames.len() >= MAX_FRAMES {
                self.runtime_error("call stack overflow");
                return Value::Null;
            }
            trace!(params, slots, depth = self.frames.len(), "call");

            let base = self.heap.root_mark();
            for slot in 0..slots {
                let value = if slot < params {
                    args.get(slot).copied().unwrap_or(Value::Null)
                } else {
                    Value::Null
                };
                self.heap.root_push(value);
            }
            self.frames.push(Frame {
                code: func.code,
                entry,
                base,
            });
            let flow = self.exec(Env { code: func.code, base }, entry);
            self.frames.pop();
            self.heap.root_truncate(base);

            match flow {
                Flow::Return(value) => return value,
                Flow::Normal => return Value::Null,
                Flow::Break | Flow::Continue => {
                    self.runtime_error("break or continue outside a loop");
                    return Value::Null;
                }
                Flow::TailCall => {
                    let Some(pending) = self.tail.take() else {
                        unreachable!("tail-call signal without a pending call");
                    };
                    func = pending.func;
                    args = pending.args;
                }
            }
        }
    }

    fn dispatch_native(&mut self, payload: Payload, args: &[Value]) -> Value {
        let Payload::Native {
            id,
            min_args,
            max_args,
        } = payload
        else {
            unreachable!("native cell payload: {payload:?}");
        };
        let Some((entry, sig)) = self.native_entry(id) else {
            self.runtime_error(format!("unknown native function id {id}"));
            return Value::Null;
        };
        let name = sig.name.clone();
        if args.len() < min_args as usize || args.len() > max_args as usize {
            self.runtime_error(format!(
                "`{name}` expects {min_args}..={max_args} arguments, got {}",
                args.len()
            ));
            return Value::Null;
        }
        // Natives may allocate; their arguments stay rooted throughout.
        let mark = self.heap.root_mark();
        for &value in args {
            self.heap.root_push(value);
        }
        let result = entry(self, args);
        self.heap.root_truncate(mark);
        match result {
            Ok(value) => value,
            Err(message) => {
                self.runtime_error(format!("native `{name}` failed: {message}"));
                Value::Null
            }
        }
    }
}
