//! Native procedures installed in the root environment. Unlike special
//! forms, these receive already-evaluated arguments; arity is declared in
//! the registry and checked by the evaluator before the function runs, so
//! the implementations only validate argument kinds.

use crate::ast::{Number, Value};
use crate::env::Environment;
use crate::{Arity, Error};
use std::cmp::Ordering;

/// A host-implemented procedure: registry name, declared arity and the
/// function itself. Stored as `&'static` references inside [`Value::Native`],
/// so identity comparison is pointer comparison.
#[derive(Debug)]
pub struct NativeProc {
    pub name: &'static str,
    pub arity: Arity,
    pub func: fn(&[Value]) -> Result<Value, Error>,
}

/// Registry of every native procedure. [`global_env`] installs each one
/// under its registry name.
pub static NATIVE_PROCS: &[NativeProc] = &[
    NativeProc { name: "+", arity: Arity::AtLeast(0), func: native_add },
    NativeProc { name: "-", arity: Arity::AtLeast(1), func: native_sub },
    NativeProc { name: "*", arity: Arity::AtLeast(1), func: native_mul },
    NativeProc { name: "/", arity: Arity::AtLeast(2), func: native_div },
    NativeProc { name: "=", arity: Arity::AtLeast(2), func: native_num_eq },
    NativeProc { name: "<", arity: Arity::AtLeast(2), func: native_lt },
    NativeProc { name: ">", arity: Arity::AtLeast(2), func: native_gt },
    NativeProc { name: "<=", arity: Arity::AtLeast(2), func: native_le },
    NativeProc { name: ">=", arity: Arity::AtLeast(2), func: native_ge },
    NativeProc { name: "max", arity: Arity::AtLeast(1), func: native_max },
    NativeProc { name: "min", arity: Arity::AtLeast(1), func: native_min },
    NativeProc { name: "equal?", arity: Arity::Exactly(2), func: native_equal },
    NativeProc { name: "not", arity: Arity::Exactly(1), func: native_not },
    NativeProc { name: "car", arity: Arity::Exactly(1), func: native_car },
    NativeProc { name: "cdr", arity: Arity::Exactly(1), func: native_cdr },
    NativeProc { name: "cons", arity: Arity::Exactly(2), func: native_cons },
    NativeProc { name: "list", arity: Arity::AtLeast(0), func: native_list },
    NativeProc { name: "length", arity: Arity::Exactly(1), func: native_length },
    NativeProc { name: "append", arity: Arity::AtLeast(0), func: native_append },
    NativeProc { name: "null?", arity: Arity::Exactly(1), func: native_is_null },
    NativeProc { name: "pair?", arity: Arity::Exactly(1), func: native_is_pair },
    NativeProc { name: "number?", arity: Arity::Exactly(1), func: native_is_number },
    NativeProc { name: "string?", arity: Arity::Exactly(1), func: native_is_string },
    NativeProc { name: "symbol?", arity: Arity::Exactly(1), func: native_is_symbol },
    NativeProc { name: "boolean?", arity: Arity::Exactly(1), func: native_is_boolean },
    NativeProc { name: "procedure?", arity: Arity::Exactly(1), func: native_is_procedure },
    NativeProc { name: "display", arity: Arity::Exactly(1), func: native_display },
    NativeProc { name: "write", arity: Arity::Exactly(1), func: native_write },
    NativeProc { name: "newline", arity: Arity::Exactly(0), func: native_newline },
    NativeProc { name: "string-append", arity: Arity::AtLeast(0), func: native_string_append },
    NativeProc { name: "number->string", arity: Arity::Exactly(1), func: native_number_to_string },
    NativeProc { name: "symbol->string", arity: Arity::Exactly(1), func: native_symbol_to_string },
    NativeProc { name: "error", arity: Arity::AtLeast(0), func: native_error },
];

/// Build a root environment with every native procedure installed.
pub fn global_env() -> Environment {
    let env = Environment::new();
    for proc in NATIVE_PROCS {
        env.define(proc.name, Value::Native(proc));
    }
    env
}

fn as_number(value: &Value, procedure: &str) -> Result<Number, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::Type(format!(
            "{procedure}: expected number, got {}: {other}",
            other.type_name()
        ))),
    }
}

fn as_string<'a>(value: &'a Value, procedure: &str) -> Result<&'a str, Error> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::Type(format!(
            "{procedure}: expected string, got {}: {other}",
            other.type_name()
        ))),
    }
}

fn native_add(args: &[Value]) -> Result<Value, Error> {
    let mut acc = Number::Int(0);
    for arg in args {
        acc = acc.checked_add(as_number(arg, "+")?)?;
    }
    Ok(Value::Number(acc))
}

fn native_sub(args: &[Value]) -> Result<Value, Error> {
    let first = as_number(&args[0], "-")?;
    if args.len() == 1 {
        return Ok(Value::Number(first.checked_neg()?));
    }
    let mut acc = first;
    for arg in &args[1..] {
        acc = acc.checked_sub(as_number(arg, "-")?)?;
    }
    Ok(Value::Number(acc))
}

fn native_mul(args: &[Value]) -> Result<Value, Error> {
    let mut acc = as_number(&args[0], "*")?;
    for arg in &args[1..] {
        acc = acc.checked_mul(as_number(arg, "*")?)?;
    }
    Ok(Value::Number(acc))
}

fn native_div(args: &[Value]) -> Result<Value, Error> {
    let mut acc = as_number(&args[0], "/")?;
    for arg in &args[1..] {
        acc = acc.checked_div(as_number(arg, "/")?)?;
    }
    Ok(Value::Number(acc))
}

/// Chained numeric comparison: every adjacent pair must satisfy `pred`.
fn compare_chain(
    args: &[Value],
    procedure: &str,
    pred: fn(Option<Ordering>) -> bool,
) -> Result<Value, Error> {
    let mut prev = as_number(&args[0], procedure)?;
    for arg in &args[1..] {
        let next = as_number(arg, procedure)?;
        if !pred(prev.compare(next)) {
            return Ok(Value::Bool(false));
        }
        prev = next;
    }
    Ok(Value::Bool(true))
}

fn native_num_eq(args: &[Value]) -> Result<Value, Error> {
    let mut prev = as_number(&args[0], "=")?;
    for arg in &args[1..] {
        let next = as_number(arg, "=")?;
        if !prev.num_eq(next) {
            return Ok(Value::Bool(false));
        }
        prev = next;
    }
    Ok(Value::Bool(true))
}

fn native_lt(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, "<", |ord| ord == Some(Ordering::Less))
}

fn native_gt(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, ">", |ord| ord == Some(Ordering::Greater))
}

fn native_le(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, "<=", |ord| {
        matches!(ord, Some(Ordering::Less | Ordering::Equal))
    })
}

fn native_ge(args: &[Value]) -> Result<Value, Error> {
    compare_chain(args, ">=", |ord| {
        matches!(ord, Some(Ordering::Greater | Ordering::Equal))
    })
}

fn extreme(args: &[Value], procedure: &str, keep: Ordering) -> Result<Value, Error> {
    let mut best = as_number(&args[0], procedure)?;
    for arg in &args[1..] {
        let next = as_number(arg, procedure)?;
        if next.compare(best) == Some(keep) {
            best = next;
        }
    }
    Ok(Value::Number(best))
}

fn native_max(args: &[Value]) -> Result<Value, Error> {
    extreme(args, "max", Ordering::Greater)
}

fn native_min(args: &[Value]) -> Result<Value, Error> {
    extreme(args, "min", Ordering::Less)
}

/// Structural equality over atoms and pair trees. Closures and native
/// procedures compare by identity.
fn native_equal(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0] == args[1]))
}

fn native_not(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn native_car(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(p) => Ok(p.car.clone()),
        other => Err(Error::Type(format!(
            "car: expected pair, got {}: {other}",
            other.type_name()
        ))),
    }
}

fn native_cdr(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Pair(p) => Ok(p.cdr.clone()),
        other => Err(Error::Type(format!(
            "cdr: expected pair, got {}: {other}",
            other.type_name()
        ))),
    }
}

fn native_cons(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn native_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::list(args.to_vec()))
}

fn native_length(args: &[Value]) -> Result<Value, Error> {
    match args[0].to_vec() {
        Some(items) => Ok(Value::Number(Number::Int(items.len() as i64))),
        None => Err(Error::Type(format!(
            "length: expected proper list, got {}: {}",
            args[0].type_name(),
            args[0]
        ))),
    }
}

fn native_append(args: &[Value]) -> Result<Value, Error> {
    let Some((last, init)) = args.split_last() else {
        return Ok(Value::Nil);
    };
    let mut items = Vec::new();
    for arg in init {
        let mut part = arg.to_vec().ok_or_else(|| {
            Error::Type(format!(
                "append: expected proper list, got {}: {arg}",
                arg.type_name()
            ))
        })?;
        items.append(&mut part);
    }
    // The final argument becomes the tail unchanged, so (append '(1) 2)
    // produces the improper list (1 . 2)
    Ok(Value::list_with_tail(items, last.clone()))
}

fn native_is_null(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args[0].is_nil()))
}

fn native_is_pair(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Pair(_))))
}

fn native_is_number(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Number(_))))
}

fn native_is_string(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::String(_))))
}

fn native_is_symbol(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

fn native_is_boolean(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(args[0], Value::Bool(_))))
}

fn native_is_procedure(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(matches!(
        args[0],
        Value::Closure(_) | Value::Native(_)
    )))
}

/// Human-readable rendering: strings without quotes, everything else in its
/// written form.
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => format!("{other}"),
    }
}

fn native_display(args: &[Value]) -> Result<Value, Error> {
    print!("{}", display_text(&args[0]));
    Ok(Value::Unspecified)
}

fn native_write(args: &[Value]) -> Result<Value, Error> {
    print!("{}", args[0]);
    Ok(Value::Unspecified)
}

fn native_newline(_args: &[Value]) -> Result<Value, Error> {
    println!();
    Ok(Value::Unspecified)
}

fn native_string_append(args: &[Value]) -> Result<Value, Error> {
    let mut out = String::new();
    for arg in args {
        out.push_str(as_string(arg, "string-append")?);
    }
    Ok(Value::String(out))
}

fn native_number_to_string(args: &[Value]) -> Result<Value, Error> {
    let n = as_number(&args[0], "number->string")?;
    Ok(Value::String(n.to_string()))
}

fn native_symbol_to_string(args: &[Value]) -> Result<Value, Error> {
    match &args[0] {
        Value::Symbol(s) => Ok(Value::String(s.clone())),
        other => Err(Error::Type(format!(
            "symbol->string: expected symbol, got {}: {other}",
            other.type_name()
        ))),
    }
}

/// `(error msg…)` aborts evaluation with the space-joined display text of
/// its arguments.
fn native_error(args: &[Value]) -> Result<Value, Error> {
    let message = args
        .iter()
        .map(display_text)
        .collect::<Vec<_>>()
        .join(" ");
    Err(Error::Eval(message))
}
