#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::rc::Rc;

use lute_diagnostic::{DiagConfig, Diagnostic, Emitter};
use lute_parse::Parser;
use lute_value::Value;
use pretty_assertions::assert_eq;

use crate::{stdlib, Interpreter, Reentry};

/// Test sink readable from outside the interpreter.
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<Diagnostic>>>);

impl SharedSink {
    fn messages(&self) -> Vec<String> {
        self.0.borrow().iter().map(|d| d.message.clone()).collect()
    }

    fn contains(&self, fragment: &str) -> bool {
        self.0.borrow().iter().any(|d| d.message.contains(fragment))
    }
}

impl Emitter for SharedSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.0.borrow_mut().push(diagnostic.clone());
    }
}

fn interpreter() -> (Interpreter, SharedSink) {
    let sink = SharedSink::default();
    let mut interp = Interpreter::with_emitter(DiagConfig::default(), Box::new(sink.clone()));
    stdlib::install(&mut interp);
    (interp, sink)
}

/// Run every unit of `source`, returning each unit's value.
fn run_units(interp: &mut Interpreter, source: &str) -> Vec<Value> {
    let sigs = interp.native_sigs();
    let mut parser = Parser::from_str(source, &sigs);
    let mut results = Vec::new();
    loop {
        match parser.parse_unit() {
            Ok(Some(buffer)) => {
                let code = interp.load_unit(buffer);
                results.push(interp.run(code).unwrap());
            }
            Ok(None) => break,
            Err(err) => panic!("parse error: {err}"),
        }
    }
    results
}

/// Run `source` in a fresh interpreter and return the last unit's value.
fn run_last(source: &str) -> (Value, Interpreter, SharedSink) {
    let (mut interp, sink) = interpreter();
    let results = run_units(&mut interp, source);
    let last = results.last().copied().unwrap_or(Value::Null);
    (last, interp, sink)
}

#[test]
fn assignment_chain_returns_seven() {
    let (value, interp, _) = run_last("x = 3; y = x + 4; return y;");
    assert_eq!(value, Value::Int(7));
    assert_eq!(interp.error_count(), 0);
}

#[test]
fn for_in_counts_two_keys() {
    let (value, interp, _) = run_last(
        "t = []; t[\"a\"] = 1; t[\"b\"] = 2; n = 0; for (k in t) n = n + 1; return n;",
    );
    assert_eq!(value, Value::Int(2));
    assert_eq!(interp.error_count(), 0);
}

#[test]
fn insertion_during_iteration_is_an_error() {
    let (_, interp, sink) = run_last(
        "t = []; t[1] = 1; t[2] = 2; for (k in t) t[k + 10] = 0; return t[11];",
    );
    assert!(sink.contains("table changed during iteration"), "{:?}", sink.messages());
    assert!(interp.error_count() >= 1);
}

#[test]
fn overwrite_during_iteration_is_allowed() {
    let (value, interp, _) = run_last(
        "t = []; t[1] = 1; t[2] = 2; for (k in t) t[k] = 0; return t[1];",
    );
    assert_eq!(value, Value::Int(0));
    assert_eq!(interp.error_count(), 0);
}

#[test]
fn script_arity_mismatch_degrades_to_null() {
    let (value, _, sink) =
        run_last("f = func(a, b) { return a; }; r = f(1); return r;");
    assert_eq!(value, Value::Null);
    assert!(
        sink.contains("wrong number of arguments: expected 2, got 1"),
        "{:?}",
        sink.messages()
    );
}

#[test]
fn native_arity_mismatch_degrades_to_null() {
    let (value, _, sink) = run_last("return len();");
    assert_eq!(value, Value::Null);
    assert!(sink.contains("arguments"), "{:?}", sink.messages());
}

#[test]
fn function_value_round_trips_through_the_call_path() {
    // Calling the extracted literal equals inlining its body.
    let (called, _, _) = run_last("f = func(x) { return x * 2; }; return f(21);");
    let (inlined, _, _) = run_last("x = 21; return x * 2;");
    assert_eq!(called, Value::Int(42));
    assert_eq!(called, inlined);
}

#[test]
fn host_calls_a_script_handler_by_name() {
    let (mut interp, _) = interpreter();
    run_units(&mut interp, "double = func(x) { return x * 2; };");
    let result = interp.call_by_name("double", &[Value::Int(5)]);
    assert_eq!(result, Some(Value::Int(10)));
}

#[test]
fn tail_recursion_runs_in_bounded_stack() {
    let (value, interp, _) = run_last(
        "count = func(n) { if (n == 0) { return 0; } return count(n - 1); }; \
         return count(100000);",
    );
    assert_eq!(value, Value::Int(0));
    assert_eq!(interp.error_count(), 0);
}

#[test]
fn non_tail_recursion_still_works() {
    let (value, _, _) = run_last(
        "fib = func(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }; \
         return fib(15);",
    );
    assert_eq!(value, Value::Int(610));
}

#[test]
fn deep_copy_shares_nothing_with_the_source() {
    let (value, _, _) = run_last(
        "t = []; t[\"inner\"] = []; t[\"inner\"][\"v\"] = 1; \
         c = copy(t); c[\"inner\"][\"v\"] = 2; return t[\"inner\"][\"v\"];",
    );
    assert_eq!(value, Value::Int(1));
}

#[test]
fn delete_makes_a_key_absent() {
    let (value, interp, _) =
        run_last("t = []; t[\"k\"] = 5; delete(t, \"k\"); return t[\"k\"];");
    assert_eq!(value, Value::Null);
    assert_eq!(interp.error_count(), 0);
}

#[test]
fn undefined_variable_is_an_error() {
    let (value, _, sink) = run_last("return nope;");
    assert_eq!(value, Value::Null);
    assert!(sink.contains("undefined variable `nope`"), "{:?}", sink.messages());
}

#[test]
fn indexing_a_non_table_is_an_error() {
    let (value, _, sink) = run_last("x = 3; return x[\"k\"];");
    assert_eq!(value, Value::Null);
    assert!(sink.contains("indexing a non-table"), "{:?}", sink.messages());
}

#[test]
fn calling_a_non_function_is_an_error() {
    let (value, _, sink) = run_last("x = 3; return x(1);");
    assert_eq!(value, Value::Null);
    assert!(sink.contains("calling a non-function"), "{:?}", sink.messages());
}

#[test]
fn arithmetic_promotion_and_canonicalization() {
    assert_eq!(run_last("return 7 / 2;").0, Value::Real(3.5));
    assert_eq!(run_last("return 6 / 2;").0, Value::Int(3));
    assert_eq!(run_last("return 6.0 / 2.0;").0, Value::Int(3));
    assert_eq!(run_last("return 7 % 3;").0, Value::Int(1));
    assert_eq!(run_last("return 7.9 % 2.9;").0, Value::Int(1));
    assert_eq!(run_last("return 1 + 2.5;").0, Value::Real(3.5));
}

#[test]
fn division_by_zero_is_an_error() {
    let (value, _, sink) = run_last("return 1 / 0;");
    assert_eq!(value, Value::Null);
    assert!(sink.contains("division by zero"), "{:?}", sink.messages());
}

#[test]
fn string_equality_is_by_content() {
    assert_eq!(run_last("return \"ab\" == \"ab\";").0, Value::Int(1));
    assert_eq!(run_last("return \"ab\" == \"ac\";").0, Value::Int(0));
    assert_eq!(run_last("return \"ab\" < \"b\";").0, Value::Int(1));
}

#[test]
fn cross_kind_relational_comparison_is_false() {
    assert_eq!(run_last("return 1 < \"two\";").0, Value::Int(0));
    assert_eq!(run_last("return 1 == \"one\";").0, Value::Int(0));
}

#[test]
fn zero_and_null_are_falsy() {
    // The branch taken is carried through `r`; the final unit reports it.
    let (value, _, _) = run_last("if (0) { r = 1; } else { r = 2; } return r;");
    assert_eq!(value, Value::Int(2));
    let (value, _, _) = run_last("t = []; if (t[9]) { r = 1; } else { r = 2; } return r;");
    assert_eq!(value, Value::Int(2));
    let (value, _, _) = run_last("if (0.5) { r = 1; } else { r = 2; } return r;");
    assert_eq!(value, Value::Int(1));
    let (value, _, _) = run_last("if (-1) { r = 1; } else { r = 2; } return r;");
    assert_eq!(value, Value::Int(1));
}

#[test]
fn break_and_continue_reach_the_nearest_loop() {
    let (value, _, _) = run_last(
        "n = 0; for (i = 0; i < 10; i = i + 1) { if (i == 3) { break; } n = n + 1; } \
         return n;",
    );
    assert_eq!(value, Value::Int(3));
    let (value, _, _) = run_last(
        "n = 0; for (i = 0; i < 5; i = i + 1) { if (i == 2) { continue; } n = n + 1; } \
         return n;",
    );
    assert_eq!(value, Value::Int(4));
}

#[test]
fn while_loop_terminates_on_condition() {
    let (value, _, _) = run_last("n = 0; while (n < 5) { n = n + 1; } return n;");
    assert_eq!(value, Value::Int(5));
}

#[test]
fn locals_are_unit_scoped() {
    let (value, interp, _) = run_last("{ local a = 5; g = a + 1; } return g;");
    assert_eq!(value, Value::Int(6));
    // The local never leaked into the globals table.
    assert_eq!(interp.error_count(), 0);
    let (_, _, sink) = run_last("{ local a = 5; } return a;");
    assert!(sink.contains("undefined variable `a`"), "{:?}", sink.messages());
}

#[test]
fn table_constructor_evaluates_expression_keys() {
    let (value, interp, _) = run_last("t = [1 + 1 = \"two\"; 3 = 4]; return t[2];");
    assert_eq!(interp.heap().display(value), "two");
    let (value, _, _) = run_last("t = [3 = 4]; return t[3];");
    assert_eq!(value, Value::Int(4));
}

#[test]
fn typeof_native_names_kinds() {
    let (value, interp, _) = run_last("return typeof([]);");
    assert_eq!(interp.heap().display(value), "table");
    let (value, interp, _) = run_last("return typeof(1.5);");
    assert_eq!(interp.heap().display(value), "real");
}

#[test]
fn len_counts_entries_and_bytes() {
    assert_eq!(run_last("t = []; t[1] = 1; t[2] = 2; return len(t);").0, Value::Int(2));
    assert_eq!(run_last("return len(\"abcd\");").0, Value::Int(4));
}

#[test]
fn allocation_heavy_loop_survives_collection() {
    // Enough garbage to cycle the collector many times mid-run.
    let (value, interp, _) = run_last(
        "keep = []; i = 0; while (i < 500) { t = []; t[1] = \"payload\"; \
         keep[i % 7] = t; i = i + 1; } return i;",
    );
    assert_eq!(value, Value::Int(500));
    assert_eq!(interp.error_count(), 0);
}

#[test]
fn same_program_is_deterministic() {
    let program = "t = []; t[1] = 2; t[2] = t[1] * 3; s = t[1] + t[2];";
    let (mut a, _) = interpreter();
    run_units(&mut a, program);
    let (mut b, _) = interpreter();
    run_units(&mut b, program);
    assert_eq!(a.get_global("s"), Value::Int(8));
    assert_eq!(a.get_global("s"), b.get_global("s"));
}

#[test]
fn reentrant_run_needs_the_flag() {
    fn reenter(interp: &mut Interpreter, _: &[Value]) -> Result<Value, String> {
        if interp.call_by_name("f", &[]).is_some() {
            return Err("re-entry was not rejected".to_string());
        }
        let callee = interp.get_global("f");
        interp
            .call(callee, &[], Reentry::Allowed)
            .ok_or_else(|| "allowed re-entry was rejected".to_string())
    }

    let (mut interp, sink) = interpreter();
    interp.register_native("reenter", 0, 0, reenter);
    let results = run_units(&mut interp, "f = func() { return 41; }; return reenter();");
    assert_eq!(results.last(), Some(&Value::Int(41)));
    assert!(sink.contains("re-entrant run rejected"), "{:?}", sink.messages());
}

#[test]
fn set_and_get_global_round_trip_host_values() {
    let (mut interp, _) = interpreter();
    interp.set_global("answer", Value::Int(42));
    let results = run_units(&mut interp, "return answer + 1;");
    assert_eq!(results.last(), Some(&Value::Int(43)));
    assert_eq!(interp.get_global("answer"), Value::Int(42));
    assert_eq!(interp.get_global("missing"), Value::Null);
}

#[test]
fn running_a_non_code_value_is_rejected() {
    let (mut interp, sink) = interpreter();
    assert_eq!(interp.run(Value::Int(3)), None);
    assert!(sink.contains("not a code value"), "{:?}", sink.messages());
}

#[test]
fn trace_budget_limits_frame_notes() {
    // Notes only pass the gate at verbosity 3.
    let config = DiagConfig {
        verbosity: 3,
        max_trace_frames: 8,
    };
    let sink = SharedSink::default();
    let mut interp = Interpreter::with_emitter(config, Box::new(sink.clone()));
    stdlib::install(&mut interp);
    run_units(
        &mut interp,
        "f = func(n) { if (n == 0) { return missing_var; } r = f(n - 1); return r; }; \
         x = f(20);",
    );
    let notes = sink
        .0
        .borrow()
        .iter()
        .filter(|d| d.message.starts_with("frame #"))
        .count();
    // The error surfaced 22 frames deep; only the budget's worth print.
    assert_eq!(notes, 8);
}
