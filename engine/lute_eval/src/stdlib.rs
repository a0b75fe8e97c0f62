//! Default native functions.
//!
//! A small, representative set registered by the CLI and available to
//! any embedder via [`install`]: `print`, `len`, `typeof`, `copy`,
//! `delete`. Hosts with richer needs register their own natives through
//! [`Interpreter::register_native`].

use lute_value::{Key, Value};

use crate::Interpreter;

/// Register the default natives, binding each as a global.
pub fn install(interp: &mut Interpreter) {
    interp.register_native("print", 0, 8, native_print);
    interp.register_native("len", 1, 1, native_len);
    interp.register_native("typeof", 1, 1, native_typeof);
    interp.register_native("copy", 1, 1, native_copy);
    interp.register_native("delete", 2, 2, native_delete);
}

fn native_print(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let line = args
        .iter()
        .map(|&value| interp.heap().display(value))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{line}");
    Ok(Value::Null)
}

fn native_len(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    match args[0] {
        Value::Str(s) => Ok(Value::Int(interp.heap().str_bytes(s).len() as i64)),
        Value::Table(t) => Ok(Value::Int(interp.heap().table(t).len() as i64)),
        other => Err(format!("expected a string or table, got {}", other.type_name())),
    }
}

fn native_typeof(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    Ok(interp.heap_mut().str_value(args[0].type_name()))
}

fn native_copy(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    Ok(interp.heap_mut().deep_copy(args[0]))
}

fn native_delete(interp: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let Value::Table(table) = args[0] else {
        return Err(format!("expected a table, got {}", args[0].type_name()));
    };
    let Some(key) = Key::from_value(args[1]) else {
        return Err(format!("invalid table key ({})", args[1].type_name()));
    };
    Ok(interp.heap_mut().table_delete(table, key))
}
