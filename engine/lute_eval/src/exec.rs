//! Statement and expression execution.
//!
//! Statements return a [`Flow`] signal; loops intercept `Break` and
//! `Continue`, the call loop in `call` intercepts `Return` and
//! `TailCall`, everything else re-propagates. Statement sequences and
//! loop iterations advance iteratively over `next` siblings; only
//! expression nesting recurses, guarded by `stacker::maybe_grow`.
//!
//! # Rooting discipline
//!
//! Every heap value held across a possible allocation (and therefore a
//! possible collection step) is pushed on the heap root stack first and
//! released in stack order. Allocation points inside this module are
//! string materialization (literals, global names) and table
//! construction.

use lute_heap::RootMark;
use lute_ir::{NodeKind, NodeRef, Payload};
use lute_value::{CodeRef, Key, Value};
use smallvec::SmallVec;

use crate::Interpreter;

const RED_ZONE: usize = 100 * 1024;
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Control-flow signal produced by statement execution.
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
    /// A `return f(...)` in tail position; the pending callee and
    /// arguments are parked on the interpreter (`tail`).
    TailCall,
}

/// Execution environment of one activation: the code object being
/// walked and the root-stack mark where its local slots start.
#[derive(Copy, Clone)]
pub(crate) struct Env {
    pub(crate) code: CodeRef,
    pub(crate) base: RootMark,
}

impl Interpreter {
    fn node(&self, env: Env, at: NodeRef) -> lute_ir::Node {
        *self.heap.code(env.code).node(at)
    }

    fn next_of(&self, env: Env, at: NodeRef) -> NodeRef {
        self.heap.code(env.code).node(at).next
    }

    fn child_of(&self, env: Env, at: NodeRef) -> NodeRef {
        match self.heap.code(env.code).node(at).payload {
            Payload::Child(child) => child,
            ref other => unreachable!("cell without child payload: {other:?}"),
        }
    }

    /// Copy out a byte-string payload (names, string literals); the
    /// borrow on the code buffer cannot be held across allocation.
    fn bytes_of(&self, env: Env, at: NodeRef) -> SmallVec<[u8; 24]> {
        match self.heap.code(env.code).node(at).payload {
            Payload::Str(slice) => {
                SmallVec::from_slice(self.heap.code(env.code).str_bytes(slice))
            }
            ref other => unreachable!("cell without string payload: {other:?}"),
        }
    }

    // Statements

    /// Execute a sibling chain of statements.
    pub(crate) fn exec_seq(&mut self, env: Env, first: NodeRef) -> Flow {
        let mut at = first;
        while at.is_some() {
            match self.exec(env, at) {
                Flow::Normal => {}
                other => return other,
            }
            at = self.next_of(env, at);
        }
        Flow::Normal
    }

    /// Execute one statement.
    pub(crate) fn exec(&mut self, env: Env, at: NodeRef) -> Flow {
        let node = self.node(env, at);
        match node.kind {
            NodeKind::Block => {
                let first = match node.payload {
                    Payload::Child(child) => child,
                    _ => NodeRef::NONE,
                };
                self.exec_seq(env, first)
            }
            NodeKind::ExprStmt => {
                self.eval(env, self.child_of(env, at));
                Flow::Normal
            }
            NodeKind::If => self.exec_if(env, at),
            NodeKind::While => self.exec_while(env, at),
            NodeKind::For => self.exec_for(env, at),
            NodeKind::ForIn => self.exec_for_in(env, at),
            NodeKind::Break => Flow::Break,
            NodeKind::Continue => Flow::Continue,
            NodeKind::Return => self.exec_return(env, at),
            // An expression in statement position (defensive; the parser
            // wraps expressions in ExprStmt).
            _ => {
                self.eval(env, at);
                Flow::Normal
            }
        }
    }

    fn exec_if(&mut self, env: Env, at: NodeRef) -> Flow {
        let cond = self.child_of(env, at);
        let then_branch = self.next_of(env, cond);
        let else_branch = self.next_of(env, then_branch);
        if self.eval(env, cond).is_truthy() {
            self.exec(env, then_branch)
        } else if else_branch.is_some() {
            self.exec(env, else_branch)
        } else {
            Flow::Normal
        }
    }

    fn exec_while(&mut self, env: Env, at: NodeRef) -> Flow {
        let cond = self.child_of(env, at);
        let body = self.next_of(env, cond);
        loop {
            if !self.eval(env, cond).is_truthy() {
                return Flow::Normal;
            }
            match self.exec(env, body) {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Flow::Normal,
                other => return other,
            }
        }
    }

    fn exec_for(&mut self, env: Env, at: NodeRef) -> Flow {
        let init = self.child_of(env, at);
        let cond = self.next_of(env, init);
        let step = self.next_of(env, cond);
        let body = self.next_of(env, step);
        match self.exec(env, init) {
            Flow::Normal => {}
            other => return other,
        }
        loop {
            if !self.eval(env, cond).is_truthy() {
                return Flow::Normal;
            }
            match self.exec(env, body) {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Flow::Normal,
                other => return other,
            }
            match self.exec(env, step) {
                Flow::Normal => {}
                other => return other,
            }
        }
    }

    fn exec_for_in(&mut self, env: Env, at: NodeRef) -> Flow {
        let var = self.child_of(env, at);
        let table_expr = self.next_of(env, var);
        let body = self.next_of(env, table_expr);

        let source = self.eval(env, table_expr);
        let Value::Table(table) = source else {
            self.runtime_error(format!(
                "for-in over a non-table ({})",
                source.type_name()
            ));
            return Flow::Normal;
        };
        // The iterated table may be a temporary (a constructor result);
        // keep it alive for the whole loop.
        let mark = self.heap.root_mark();
        self.heap.root_push(source);
        let flow = self.for_in_loop(env, var, table, body);
        self.heap.root_truncate(mark);
        flow
    }

    fn for_in_loop(
        &mut self,
        env: Env,
        var: NodeRef,
        table: lute_value::TableRef,
        body: NodeRef,
    ) -> Flow {
        let mut step = self.heap.table_first(table);
        loop {
            let Some((key, _, cursor)) = step else {
                return Flow::Normal;
            };
            self.assign_var(env, var, key);
            match self.exec(env, body) {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Flow::Normal,
                other => return other,
            }
            match self.heap.table_next(table, cursor) {
                Ok(next) => step = next,
                Err(err) => {
                    self.runtime_error(err.to_string());
                    return Flow::Normal;
                }
            }
        }
    }

    fn exec_return(&mut self, env: Env, at: NodeRef) -> Flow {
        let value_ref = match self.node(env, at).payload {
            Payload::Child(child) => child,
            _ => return Flow::Return(Value::Null),
        };
        // `return f(...)`: evaluate callee and actuals, then unwind; the
        // frame loop re-enters without growing the native stack.
        if self.node(env, value_ref).kind == NodeKind::Call {
            let (callee, args) = self.eval_call_parts(env, value_ref);
            return match callee {
                Value::Func(func) => {
                    self.tail = Some(crate::PendingCall { func, args });
                    Flow::TailCall
                }
                other => {
                    self.runtime_error(format!(
                        "calling a non-function ({})",
                        other.type_name()
                    ));
                    Flow::Return(Value::Null)
                }
            };
        }
        Flow::Return(self.eval(env, value_ref))
    }

    /// Write the `for-in` loop variable (a `Global` or `Local` cell).
    fn assign_var(&mut self, env: Env, var: NodeRef, value: Value) {
        let node = self.node(env, var);
        match node.kind {
            NodeKind::Local => {
                let Payload::Int(slot) = node.payload else {
                    unreachable!("local cell without slot payload");
                };
                self.heap.root_set(env.base.slot(slot as usize), value);
            }
            NodeKind::Global => {
                let name = self.bytes_of(env, var);
                let mark = self.heap.root_mark();
                self.heap.root_push(value);
                let key = self.heap.str_key(&name);
                self.heap.table_set(self.globals, key, value);
                self.heap.root_truncate(mark);
            }
            kind => unreachable!("unassignable loop variable cell: {kind:?}"),
        }
    }

    // Expressions

    /// Evaluate an expression. Errors degrade to `Null` after reporting;
    /// there is no error type on this path.
    pub(crate) fn eval(&mut self, env: Env, at: NodeRef) -> Value {
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || self.eval_inner(env, at))
    }

    fn eval_inner(&mut self, env: Env, at: NodeRef) -> Value {
        let node = self.node(env, at);
        match node.kind {
            NodeKind::IntLit => match node.payload {
                Payload::Int(v) => Value::Int(v),
                ref other => unreachable!("int literal payload: {other:?}"),
            },
            NodeKind::RealLit => match node.payload {
                Payload::Real(v) => Value::real(v),
                ref other => unreachable!("real literal payload: {other:?}"),
            },
            NodeKind::StrLit => {
                let bytes = self.bytes_of(env, at);
                Value::Str(self.heap.alloc_str(&bytes))
            }
            NodeKind::Global => self.eval_global(env, at),
            NodeKind::Local => match node.payload {
                Payload::Int(slot) => self.heap.root_get(env.base.slot(slot as usize)),
                ref other => unreachable!("local cell payload: {other:?}"),
            },
            NodeKind::Func => Value::Func(lute_value::FuncValue {
                code: env.code,
                entry: at,
            }),
            NodeKind::Assign => self.eval_assign(env, at),
            NodeKind::Index => self.eval_index(env, at),
            NodeKind::Call => {
                let (callee, args) = self.eval_call_parts(env, at);
                self.call_value(callee, args)
            }
            NodeKind::TableCons => self.eval_table_cons(env, at),
            NodeKind::Or | NodeKind::And => self.eval_logical(env, at, node.kind),
            NodeKind::Not => {
                let truthy = self.eval(env, self.child_of(env, at)).is_truthy();
                Value::Int(i64::from(!truthy))
            }
            NodeKind::Neg => self.eval_neg(env, at),
            NodeKind::Eq | NodeKind::Ne => self.eval_equality(env, at, node.kind),
            NodeKind::Lt | NodeKind::Le | NodeKind::Gt | NodeKind::Ge => {
                self.eval_relational(env, at, node.kind)
            }
            NodeKind::Add | NodeKind::Sub | NodeKind::Mul | NodeKind::Div | NodeKind::Mod => {
                self.eval_arith(env, at, node.kind)
            }
            kind => unreachable!("unrecognized expression cell: {kind:?}"),
        }
    }

    fn eval_global(&mut self, env: Env, at: NodeRef) -> Value {
        let name = self.bytes_of(env, at);
        let key = self.heap.str_key(&name);
        if !self.heap.table_contains(self.globals, key) {
            self.runtime_error(format!(
                "undefined variable `{}`",
                String::from_utf8_lossy(&name)
            ));
            return Value::Null;
        }
        self.heap.table_get(self.globals, key)
    }

    fn eval_assign(&mut self, env: Env, at: NodeRef) -> Value {
        let target = self.child_of(env, at);
        let value_expr = self.next_of(env, target);
        let target_node = self.node(env, target);
        match target_node.kind {
            NodeKind::Local => {
                let Payload::Int(slot) = target_node.payload else {
                    unreachable!("local cell without slot payload");
                };
                let value = self.eval(env, value_expr);
                self.heap.root_set(env.base.slot(slot as usize), value);
                value
            }
            NodeKind::Global => {
                let value = self.eval(env, value_expr);
                self.assign_var(env, target, value);
                value
            }
            NodeKind::Index => {
                // Left-to-right: table part, key part, then the value.
                let table_expr = self.child_of(env, target);
                let key_expr = self.next_of(env, table_expr);
                let tv = self.eval(env, table_expr);
                let Value::Table(table) = tv else {
                    self.runtime_error(format!(
                        "indexing a non-table ({})",
                        tv.type_name()
                    ));
                    return Value::Null;
                };
                let mark = self.heap.root_mark();
                self.heap.root_push(tv);
                let kv = self.eval(env, key_expr);
                self.heap.root_push(kv);
                let value = self.eval(env, value_expr);
                let result = match Key::from_value(kv) {
                    Some(key) => {
                        self.heap.table_set(table, key, value);
                        value
                    }
                    None => {
                        self.runtime_error(format!(
                            "invalid table key ({})",
                            kv.type_name()
                        ));
                        Value::Null
                    }
                };
                self.heap.root_truncate(mark);
                result
            }
            kind => unreachable!("unassignable target cell: {kind:?}"),
        }
    }

    fn eval_index(&mut self, env: Env, at: NodeRef) -> Value {
        let table_expr = self.child_of(env, at);
        let key_expr = self.next_of(env, table_expr);
        let tv = self.eval(env, table_expr);
        let Value::Table(table) = tv else {
            self.runtime_error(format!("indexing a non-table ({})", tv.type_name()));
            return Value::Null;
        };
        let mark = self.heap.root_mark();
        self.heap.root_push(tv);
        let kv = self.eval(env, key_expr);
        self.heap.root_truncate(mark);
        match Key::from_value(kv) {
            // Absent keys read as Null, without a diagnostic.
            Some(key) => self.heap.table_get(table, key),
            None => {
                self.runtime_error(format!("invalid table key ({})", kv.type_name()));
                Value::Null
            }
        }
    }

    fn eval_table_cons(&mut self, env: Env, at: NodeRef) -> Value {
        let table = self.heap.alloc_table();
        let mark = self.heap.root_mark();
        self.heap.root_push(Value::Table(table));
        let mut entry = match self.node(env, at).payload {
            Payload::Child(child) => child,
            _ => NodeRef::NONE,
        };
        while entry.is_some() {
            let key_expr = self.child_of(env, entry);
            let value_expr = self.next_of(env, key_expr);
            let inner = self.heap.root_mark();
            let kv = self.eval(env, key_expr);
            self.heap.root_push(kv);
            let value = self.eval(env, value_expr);
            match Key::from_value(kv) {
                Some(key) => self.heap.table_set(table, key, value),
                None => self.runtime_error(format!(
                    "invalid table key ({}) in constructor",
                    kv.type_name()
                )),
            }
            self.heap.root_truncate(inner);
            entry = self.next_of(env, entry);
        }
        self.heap.root_truncate(mark);
        Value::Table(table)
    }

    fn eval_logical(&mut self, env: Env, at: NodeRef, kind: NodeKind) -> Value {
        let left = self.child_of(env, at);
        let right = self.next_of(env, left);
        let l = self.eval(env, left).is_truthy();
        let decided = match kind {
            NodeKind::Or => l,
            _ => !l,
        };
        if decided {
            return Value::Int(i64::from(l));
        }
        Value::Int(i64::from(self.eval(env, right).is_truthy()))
    }

    fn eval_equality(&mut self, env: Env, at: NodeRef, kind: NodeKind) -> Value {
        let (l, r) = self.eval_operands(env, at);
        let eq = self.heap.value_eq(l, r);
        let result = match kind {
            NodeKind::Eq => eq,
            _ => !eq,
        };
        Value::Int(i64::from(result))
    }

    fn eval_relational(&mut self, env: Env, at: NodeRef, kind: NodeKind) -> Value {
        let (l, r) = self.eval_operands(env, at);
        // Incomparable operands (cross-kind, tables, functions) compare
        // false rather than erroring.
        let result = match self.heap.value_cmp(l, r) {
            Some(ordering) => match kind {
                NodeKind::Lt => ordering.is_lt(),
                NodeKind::Le => ordering.is_le(),
                NodeKind::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            },
            None => false,
        };
        Value::Int(i64::from(result))
    }

    fn eval_neg(&mut self, env: Env, at: NodeRef) -> Value {
        let operand = self.eval(env, self.child_of(env, at));
        match operand {
            Value::Int(v) => match v.checked_neg() {
                Some(n) => Value::Int(n),
                None => Value::real(-(v as f64)),
            },
            Value::Real(v) => Value::real(-v),
            other => {
                self.runtime_error(format!(
                    "missing operand to `-` ({} is not a number)",
                    other.type_name()
                ));
                Value::Null
            }
        }
    }

    fn eval_arith(&mut self, env: Env, at: NodeRef, kind: NodeKind) -> Value {
        let (l, r) = self.eval_operands(env, at);
        let (Some(lf), Some(rf)) = (l.as_real(), r.as_real()) else {
            let bad = if l.as_real().is_none() { l } else { r };
            self.runtime_error(format!(
                "missing operand to {} ({} is not a number)",
                op_symbol(kind),
                bad.type_name()
            ));
            return Value::Null;
        };
        match kind {
            NodeKind::Add => match (l, r) {
                (Value::Int(a), Value::Int(b)) => match a.checked_add(b) {
                    Some(v) => Value::Int(v),
                    None => Value::real(lf + rf),
                },
                _ => Value::real(lf + rf),
            },
            NodeKind::Sub => match (l, r) {
                (Value::Int(a), Value::Int(b)) => match a.checked_sub(b) {
                    Some(v) => Value::Int(v),
                    None => Value::real(lf - rf),
                },
                _ => Value::real(lf - rf),
            },
            NodeKind::Mul => match (l, r) {
                (Value::Int(a), Value::Int(b)) => match a.checked_mul(b) {
                    Some(v) => Value::Int(v),
                    None => Value::real(lf * rf),
                },
                _ => Value::real(lf * rf),
            },
            // Always real division: canonicalization makes integers and
            // integral reals indistinguishable, so there is no separate
            // integer `/`. An integral quotient canonicalizes back.
            NodeKind::Div => {
                if rf == 0.0 {
                    self.runtime_error("division by zero");
                    return Value::Null;
                }
                Value::real(lf / rf)
            }
            // `%` truncates both operands to integer.
            _ => {
                let (a, b) = (lf as i64, rf as i64);
                if b == 0 {
                    self.runtime_error("modulo by zero");
                    return Value::Null;
                }
                match a.checked_rem(b) {
                    Some(v) => Value::Int(v),
                    None => Value::Int(0),
                }
            }
        }
    }

    /// Evaluate both operands of a binary cell, keeping the left rooted
    /// while the right evaluates.
    fn eval_operands(&mut self, env: Env, at: NodeRef) -> (Value, Value) {
        let left = self.child_of(env, at);
        let right = self.next_of(env, left);
        let l = self.eval(env, left);
        let mark = self.heap.root_mark();
        self.heap.root_push(l);
        let r = self.eval(env, right);
        self.heap.root_truncate(mark);
        (l, r)
    }
}

fn op_symbol(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Add => "`+`",
        NodeKind::Sub => "`-`",
        NodeKind::Mul => "`*`",
        NodeKind::Div => "`/`",
        _ => "`%`",
    }
}
