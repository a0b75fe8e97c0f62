#![allow(clippy::unwrap_used)]

use lute_ir::{CodeBuffer, NodeKind, NodeRef, Payload};
use pretty_assertions::assert_eq;

use crate::{NativeSig, Parser};

fn parse_one(source: &str) -> CodeBuffer {
    parse_with(source, &[])
}

fn parse_with(source: &str, natives: &[NativeSig]) -> CodeBuffer {
    let mut parser = Parser::from_str(source, natives);
    parser.parse_unit().unwrap().unwrap()
}

/// First child of the cell at `at`.
fn child(buffer: &CodeBuffer, at: NodeRef) -> NodeRef {
    match buffer.node(at).payload {
        Payload::Child(child) => child,
        ref other => panic!("expected child payload, got {other:?}"),
    }
}

fn int_of(buffer: &CodeBuffer, at: NodeRef) -> i64 {
    match buffer.node(at).payload {
        Payload::Int(v) => v,
        ref other => panic!("expected int payload, got {other:?}"),
    }
}

fn str_of<'a>(buffer: &'a CodeBuffer, at: NodeRef) -> &'a [u8] {
    match buffer.node(at).payload {
        Payload::Str(slice) => buffer.str_bytes(slice),
        ref other => panic!("expected string payload, got {other:?}"),
    }
}

#[test]
fn return_literal() {
    let buffer = parse_one("return 42;");
    let root = buffer.root();
    assert_eq!(buffer.node(root).kind, NodeKind::Return);
    let value = child(&buffer, root);
    assert_eq!(buffer.node(value).kind, NodeKind::IntLit);
    assert_eq!(int_of(&buffer, value), 42);
}

#[test]
fn empty_input_yields_no_unit() {
    let mut parser = Parser::from_str("  ;; // nothing here\n", &[]);
    assert!(parser.parse_unit().unwrap().is_none());
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let buffer = parse_one("x = 1 + 2 * 3;");
    let assign = child(&buffer, buffer.root());
    assert_eq!(buffer.node(assign).kind, NodeKind::Assign);
    let target = child(&buffer, assign);
    assert_eq!(buffer.node(target).kind, NodeKind::Global);
    assert_eq!(str_of(&buffer, target), b"x");

    let add = buffer.node(target).next;
    assert_eq!(buffer.node(add).kind, NodeKind::Add);
    let one = child(&buffer, add);
    assert_eq!(int_of(&buffer, one), 1);
    let mul = buffer.node(one).next;
    assert_eq!(buffer.node(mul).kind, NodeKind::Mul);
    let two = child(&buffer, mul);
    assert_eq!(int_of(&buffer, two), 2);
    assert_eq!(int_of(&buffer, buffer.node(two).next), 3);
}

#[test]
fn subtraction_is_left_associative() {
    let buffer = parse_one("r = 10 - 2 - 3;");
    let assign = child(&buffer, buffer.root());
    let target = child(&buffer, assign);
    let outer = buffer.node(target).next;
    assert_eq!(buffer.node(outer).kind, NodeKind::Sub);
    let inner = child(&buffer, outer);
    assert_eq!(buffer.node(inner).kind, NodeKind::Sub);
    assert_eq!(int_of(&buffer, buffer.node(inner).next), 3);
    let ten = child(&buffer, inner);
    assert_eq!(int_of(&buffer, ten), 10);
    assert_eq!(int_of(&buffer, buffer.node(ten).next), 2);
}

#[test]
fn dotted_field_becomes_string_index() {
    let buffer = parse_one("v = t.field;");
    let assign = child(&buffer, buffer.root());
    let target = child(&buffer, assign);
    let index = buffer.node(target).next;
    assert_eq!(buffer.node(index).kind, NodeKind::Index);
    let table = child(&buffer, index);
    assert_eq!(buffer.node(table).kind, NodeKind::Global);
    let key = buffer.node(table).next;
    assert_eq!(buffer.node(key).kind, NodeKind::StrLit);
    assert_eq!(str_of(&buffer, key), b"field");
}

#[test]
fn call_arguments_chain_off_the_callee() {
    let buffer = parse_one("f(1, 2);");
    let call = child(&buffer, buffer.root());
    assert_eq!(buffer.node(call).kind, NodeKind::Call);
    let callee = child(&buffer, call);
    assert_eq!(buffer.node(callee).kind, NodeKind::Global);
    assert_eq!(str_of(&buffer, callee), b"f");
    let first = buffer.node(callee).next;
    assert_eq!(int_of(&buffer, first), 1);
    let second = buffer.node(first).next;
    assert_eq!(int_of(&buffer, second), 2);
    assert_eq!(buffer.node(second).next, NodeRef::NONE);
}

#[test]
fn table_constructor_entries() {
    let buffer = parse_one("t = [1 = 2; \"k\" = 3];");
    let assign = child(&buffer, buffer.root());
    let target = child(&buffer, assign);
    let cons = buffer.node(target).next;
    assert_eq!(buffer.node(cons).kind, NodeKind::TableCons);

    let first = child(&buffer, cons);
    assert_eq!(buffer.node(first).kind, NodeKind::TableEntry);
    let key1 = child(&buffer, first);
    assert_eq!(int_of(&buffer, key1), 1);
    assert_eq!(int_of(&buffer, buffer.node(key1).next), 2);

    let second = buffer.node(first).next;
    assert_eq!(buffer.node(second).kind, NodeKind::TableEntry);
    let key2 = child(&buffer, second);
    assert_eq!(str_of(&buffer, key2), b"k");
    assert_eq!(int_of(&buffer, buffer.node(key2).next), 3);
    assert_eq!(buffer.node(second).next, NodeRef::NONE);
}

#[test]
fn empty_table_constructor() {
    let buffer = parse_one("t = [];");
    let assign = child(&buffer, buffer.root());
    let cons = buffer.node(child(&buffer, assign)).next;
    assert_eq!(buffer.node(cons).kind, NodeKind::TableCons);
    assert_eq!(child(&buffer, cons), NodeRef::NONE);
}

#[test]
fn locals_resolve_to_slots_in_declaration_order() {
    let buffer = parse_one("{ local a = 1; local b = a; }");
    assert_eq!(buffer.slots(), 2);

    let first = child(&buffer, buffer.root());
    let assign_a = child(&buffer, first);
    let slot_a = child(&buffer, assign_a);
    assert_eq!(buffer.node(slot_a).kind, NodeKind::Local);
    assert_eq!(int_of(&buffer, slot_a), 0);

    let second = buffer.node(first).next;
    let assign_b = child(&buffer, second);
    let slot_b = child(&buffer, assign_b);
    assert_eq!(int_of(&buffer, slot_b), 1);
    // The right-hand `a` reads slot 0.
    let read_a = buffer.node(slot_b).next;
    assert_eq!(buffer.node(read_a).kind, NodeKind::Local);
    assert_eq!(int_of(&buffer, read_a), 0);
}

#[test]
fn duplicate_local_is_an_error() {
    let mut parser = Parser::from_str("{ local a; local a; }", &[]);
    let err = parser.parse_unit().unwrap_err();
    assert!(err.message.contains("duplicate local"), "{}", err.message);
}

#[test]
fn function_literal_header_and_body() {
    let buffer = parse_one("f = func(x) { return x; };");
    let assign = child(&buffer, buffer.root());
    let func = buffer.node(child(&buffer, assign)).next;
    assert_eq!(buffer.node(func).kind, NodeKind::Func);
    let (entry, params, slots) = match buffer.node(func).payload {
        Payload::Func {
            entry,
            params,
            slots,
        } => (entry, params, slots),
        ref other => panic!("expected func payload, got {other:?}"),
    };
    assert_eq!(params, 1);
    assert_eq!(slots, 1);

    // Body: block containing `return x` where x is the parameter slot.
    assert_eq!(buffer.node(entry).kind, NodeKind::Block);
    let ret = child(&buffer, entry);
    assert_eq!(buffer.node(ret).kind, NodeKind::Return);
    let x = child(&buffer, ret);
    assert_eq!(buffer.node(x).kind, NodeKind::Local);
    assert_eq!(int_of(&buffer, x), 0);
}

#[test]
fn outer_locals_are_not_visible_inside_functions() {
    let buffer = parse_one("{ local a = 1; f = func() { return a; }; }");
    let first = child(&buffer, buffer.root());
    let second = buffer.node(first).next;
    let assign = child(&buffer, second);
    let func = buffer.node(child(&buffer, assign)).next;
    let entry = match buffer.node(func).payload {
        Payload::Func { entry, .. } => entry,
        ref other => panic!("expected func payload, got {other:?}"),
    };
    let ret = child(&buffer, entry);
    let a = child(&buffer, ret);
    // `a` inside the function falls back to a global read.
    assert_eq!(buffer.node(a).kind, NodeKind::Global);
    assert_eq!(str_of(&buffer, a), b"a");
}

#[test]
fn internal_binding_compiles_to_native_call() {
    let natives = [NativeSig {
        name: "print".to_string(),
        id: 7,
        min_args: 1,
        max_args: 4,
    }];
    let buffer = parse_with("p = func(v) internal \"print\";", &natives);
    let assign = child(&buffer, buffer.root());
    let func = buffer.node(child(&buffer, assign)).next;
    let entry = match buffer.node(func).payload {
        Payload::Func { entry, .. } => entry,
        ref other => panic!("expected func payload, got {other:?}"),
    };
    assert_eq!(buffer.node(entry).kind, NodeKind::NativeCall);
    assert_eq!(
        buffer.node(entry).payload,
        Payload::Native {
            id: 7,
            min_args: 1,
            max_args: 4,
        }
    );
}

#[test]
fn unknown_internal_name_is_an_error() {
    let mut parser = Parser::from_str("p = func() internal \"nope\";", &[]);
    let err = parser.parse_unit().unwrap_err();
    assert!(err.message.contains("unknown internal"), "{}", err.message);
}

#[test]
fn for_in_loop_shape() {
    let buffer = parse_one("for (k in t) { break; }");
    let root = buffer.root();
    assert_eq!(buffer.node(root).kind, NodeKind::ForIn);
    let var = child(&buffer, root);
    assert_eq!(buffer.node(var).kind, NodeKind::Global);
    assert_eq!(str_of(&buffer, var), b"k");
    let table = buffer.node(var).next;
    assert_eq!(str_of(&buffer, table), b"t");
    let body = buffer.node(table).next;
    assert_eq!(buffer.node(body).kind, NodeKind::Block);
    let brk = child(&buffer, body);
    assert_eq!(buffer.node(brk).kind, NodeKind::Break);
}

#[test]
fn empty_for_header_gets_neutral_parts() {
    let buffer = parse_one("for (;;) { break; }");
    let root = buffer.root();
    assert_eq!(buffer.node(root).kind, NodeKind::For);
    let init = child(&buffer, root);
    assert_eq!(buffer.node(init).kind, NodeKind::Block);
    assert_eq!(child(&buffer, init), NodeRef::NONE);
    let cond = buffer.node(init).next;
    assert_eq!(buffer.node(cond).kind, NodeKind::IntLit);
    assert_eq!(int_of(&buffer, cond), 1);
    let step = buffer.node(cond).next;
    assert_eq!(buffer.node(step).kind, NodeKind::Block);
}

#[test]
fn if_else_chains_branches_off_the_condition() {
    let buffer = parse_one("if (c) { x = 1; } else { x = 2; }");
    let root = buffer.root();
    assert_eq!(buffer.node(root).kind, NodeKind::If);
    let cond = child(&buffer, root);
    assert_eq!(buffer.node(cond).kind, NodeKind::Global);
    let then_branch = buffer.node(cond).next;
    assert_eq!(buffer.node(then_branch).kind, NodeKind::Block);
    let else_branch = buffer.node(then_branch).next;
    assert_eq!(buffer.node(else_branch).kind, NodeKind::Block);
}

#[test]
fn literal_is_not_an_assignment_target() {
    let mut parser = Parser::from_str("3 = 4;", &[]);
    let err = parser.parse_unit().unwrap_err();
    assert!(err.message.contains("assignment target"), "{}", err.message);
}

#[test]
fn error_recovery_resumes_at_the_next_unit() {
    let mut parser = Parser::from_str("x = ;\ny = 2;", &[]);
    let err = parser.parse_unit().unwrap_err();
    assert_eq!(err.line, 1);

    let buffer = parser.parse_unit().unwrap().unwrap();
    let assign = child(&buffer, buffer.root());
    let target = child(&buffer, assign);
    assert_eq!(str_of(&buffer, target), b"y");
    assert_eq!(int_of(&buffer, buffer.node(target).next), 2);

    assert!(parser.parse_unit().unwrap().is_none());
}

#[test]
fn recovery_skips_past_nested_braces() {
    // The statements inside the braces belong to the broken unit and
    // must not surface as units of their own.
    let mut parser = Parser::from_str("local 5 { a; b; }\nz = 5;", &[]);
    assert!(parser.parse_unit().is_err());
    let buffer = parser.parse_unit().unwrap().unwrap();
    let assign = child(&buffer, buffer.root());
    assert_eq!(str_of(&buffer, child(&buffer, assign)), b"z");
    assert!(parser.parse_unit().unwrap().is_none());
}

#[test]
fn unterminated_string_is_a_syntax_error() {
    let mut parser = Parser::from_str("x = \"abc", &[]);
    assert!(parser.parse_unit().is_err());
}

#[test]
fn parse_error_display_carries_the_line() {
    let mut parser = Parser::from_str("\n\nreturn @;", &[]);
    let err = parser.parse_unit().unwrap_err();
    assert_eq!(err.line, 3);
    let shown = err.to_string();
    assert!(shown.starts_with("syntax error at line 3"), "{shown}");
}
