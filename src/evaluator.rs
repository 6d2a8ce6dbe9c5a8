//! The evaluator: reduces an expression tree to a value within an
//! environment. Dispatch order is fixed: self-evaluating atoms return
//! themselves, symbols resolve through the environment chain, a list whose
//! head names a special form is handed that form's unevaluated sub-forms,
//! and every other list is an application (head first, then arguments left
//! to right, all in the current environment).
//!
//! Errors are never recovered internally: a failing sub-evaluation aborts
//! the whole top-level form and propagates to the caller. Evaluation depth
//! is bounded so unbounded recursion becomes an error instead of a host
//! stack overflow.

use std::rc::Rc;

use crate::ast::{Closure, Params, Value};
use crate::env::Environment;
use crate::{Arity, Error, MAX_EVAL_DEPTH};

/// Evaluate an expression (public API).
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_at_depth(expr, env, 0)
}

fn eval_at_depth(expr: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::Eval(format!(
            "evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        )));
    }
    match expr {
        // Self-evaluating atoms, including the empty list
        Value::Number(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::Nil
        | Value::Closure(_)
        | Value::Native(_)
        | Value::Unspecified => Ok(expr.clone()),

        // Variable lookup
        Value::Symbol(name) => env.lookup(name),

        // Special form or application
        Value::Pair(_) => {
            let items = expr
                .to_vec()
                .ok_or_else(|| Error::Eval(format!("cannot evaluate improper list: {expr}")))?;
            if let Value::Symbol(name) = &items[0] {
                if let Some(form) = special_form(name) {
                    return form(&items[1..], env, depth);
                }
            }
            eval_application(&items, env, depth)
        }
    }
}

/// A special form receives its unevaluated sub-forms and decides what to
/// evaluate, and in which environment.
type SpecialFormFn = fn(&[Value], &Environment, usize) -> Result<Value, Error>;

/// Fixed dispatch table for special-form keywords.
fn special_form(name: &str) -> Option<SpecialFormFn> {
    Some(match name {
        "quote" => eval_quote,
        "if" => eval_if,
        "define" => eval_define,
        "set!" => eval_set,
        "lambda" => eval_lambda,
        "begin" => eval_begin,
        "let" => eval_let,
        "and" => eval_and,
        "or" => eval_or,
        _ => return None,
    })
}

/// Evaluate argument expressions left to right.
fn eval_args(args: &[Value], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_at_depth(arg, env, depth + 1))
        .collect()
}

fn eval_application(items: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let callee = eval_at_depth(&items[0], env, depth + 1)?;
    let args = eval_args(&items[1..], env, depth)?;
    apply(&callee, args, depth)
}

/// Apply a callable to already-evaluated arguments.
pub fn apply(callee: &Value, args: Vec<Value>, depth: usize) -> Result<Value, Error> {
    match callee {
        Value::Native(proc) => {
            proc.arity.validate(args.len(), proc.name)?;
            (proc.func)(&args)
        }
        Value::Closure(closure) => apply_closure(closure, args, depth),
        other => Err(Error::NotApplicable(format!("{other}"))),
    }
}

fn apply_closure(closure: &Closure, args: Vec<Value>, depth: usize) -> Result<Value, Error> {
    closure.params.arity().validate(args.len(), "closure")?;

    // One fresh frame per application, chained to the defining environment
    let frame = closure.env.child();
    let mut args = args.into_iter();
    for name in &closure.params.required {
        // Arity was validated above, so an argument exists for every name
        if let Some(value) = args.next() {
            frame.define(name.clone(), value);
        }
    }
    if let Some(rest) = &closure.params.rest {
        frame.define(rest.clone(), Value::list(args.collect::<Vec<_>>()));
    }

    eval_sequence(&closure.body, &frame, depth + 1)
}

/// Evaluate expressions in order, returning the last value. An empty
/// sequence yields nil; this is the documented policy for empty `begin`
/// and empty function bodies.
fn eval_sequence(body: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut result = Value::Nil;
    for expr in body {
        result = eval_at_depth(expr, env, depth)?;
    }
    Ok(result)
}

/// `(quote x)` returns `x` unevaluated.
fn eval_quote(args: &[Value], _env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_for("quote", Arity::Exactly(1), args.len())),
    }
}

/// `(if cond then else?)`. Any value other than `#f` is truthy; a false
/// condition with no else branch yields nil.
fn eval_if(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [condition, then_branch, rest @ ..] if rest.len() <= 1 => {
            if eval_at_depth(condition, env, depth + 1)?.is_truthy() {
                eval_at_depth(then_branch, env, depth + 1)
            } else if let [else_branch] = rest {
                eval_at_depth(else_branch, env, depth + 1)
            } else {
                Ok(Value::Nil)
            }
        }
        _ => Err(Error::arity_for("if", Arity::Range(2, 3), args.len())),
    }
}

/// `(define name expr)` binds in the current frame; `(define (name params…)
/// body…)` is sugar for binding a lambda. Redefinition overwrites.
fn eval_define(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_at_depth(expr, env, depth + 1)?;
            env.define(name.clone(), value);
            Ok(Value::Unspecified)
        }
        [Value::Pair(signature), body @ ..] if !body.is_empty() => {
            let Value::Symbol(name) = &signature.car else {
                return Err(Error::Type(
                    "define: function name must be a symbol".into(),
                ));
            };
            let params = parse_params(&signature.cdr)?;
            let closure = Value::Closure(Rc::new(Closure {
                params,
                body: body.to_vec(),
                env: env.clone(),
            }));
            env.define(name.clone(), closure);
            Ok(Value::Unspecified)
        }
        [_, _] => Err(Error::Type(
            "define requires a symbol or a signature list".into(),
        )),
        _ => Err(Error::arity_for("define", Arity::AtLeast(2), args.len())),
    }
}

/// `(set! name expr)` mutates an existing binding; unbound targets error
/// instead of creating a global. This is what distinguishes it from `define`.
fn eval_set(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_at_depth(expr, env, depth + 1)?;
            env.set(name, value)?;
            Ok(Value::Unspecified)
        }
        [_, _] => Err(Error::Type("set! requires a symbol".into())),
        _ => Err(Error::arity_for("set!", Arity::Exactly(2), args.len())),
    }
}

/// `(lambda params body…)` captures the current environment. The parameter
/// spec is a proper list of symbols, a dotted list with a rest name, or a
/// bare symbol collecting all arguments.
fn eval_lambda(args: &[Value], env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [spec, body @ ..] if !body.is_empty() => {
            let params = parse_params(spec)?;
            Ok(Value::Closure(Rc::new(Closure {
                params,
                body: body.to_vec(),
                env: env.clone(),
            })))
        }
        _ => Err(Error::arity_for("lambda", Arity::AtLeast(2), args.len())),
    }
}

/// Parse a parameter spec into fixed names plus an optional rest name.
fn parse_params(spec: &Value) -> Result<Params, Error> {
    fn push_name(name: &str, required: &[String]) -> Result<String, Error> {
        if required.iter().any(|r| r == name) {
            return Err(Error::Eval(format!("duplicate parameter name: {name}")));
        }
        Ok(name.to_owned())
    }

    let mut required = Vec::new();
    let mut rest = None;

    let mut current = spec;
    loop {
        match current {
            Value::Nil => break,
            Value::Symbol(name) => {
                rest = Some(push_name(name, &required)?);
                break;
            }
            Value::Pair(p) => {
                let Value::Symbol(name) = &p.car else {
                    return Err(Error::Type("lambda parameters must be symbols".into()));
                };
                let name = push_name(name, &required)?;
                required.push(name);
                current = &p.cdr;
            }
            _ => {
                return Err(Error::Type(
                    "lambda parameters must be a list or a symbol".into(),
                ));
            }
        }
    }

    Ok(Params { required, rest })
}

/// `(begin expr…)` evaluates in sequence in the current environment and
/// returns the last value; empty `begin` yields nil.
fn eval_begin(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    eval_sequence(args, env, depth + 1)
}

/// `(let ((name expr)…) body…)`: initialisers evaluate in the outer
/// environment, all names bind simultaneously in one new child frame.
fn eval_let(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [bindings, body @ ..] => {
            let binding_forms = bindings
                .to_vec()
                .ok_or_else(|| Error::Type("let bindings must be a list".into()))?;

            let mut evaluated = Vec::with_capacity(binding_forms.len());
            for form in &binding_forms {
                match form.to_vec().as_deref() {
                    Some([Value::Symbol(name), expr]) => {
                        evaluated.push((name.clone(), eval_at_depth(expr, env, depth + 1)?));
                    }
                    _ => {
                        return Err(Error::Type(format!(
                            "let binding must be (name expression), got: {form}"
                        )));
                    }
                }
            }

            let frame = env.child();
            for (name, value) in evaluated {
                frame.define(name, value);
            }
            eval_sequence(body, &frame, depth + 1)
        }
        [] => Err(Error::arity_for("let", Arity::AtLeast(1), 0)),
    }
}

/// `(and expr…)`: evaluate left to right, return the first false value or
/// the last value. Empty `and` is `#t`.
fn eval_and(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut result = Value::Bool(true);
    for arg in args {
        result = eval_at_depth(arg, env, depth + 1)?;
        if !result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(result)
}

/// `(or expr…)`: evaluate left to right, return the first truthy value or
/// the last value. Empty `or` is `#f`.
fn eval_or(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut result = Value::Bool(false);
    for arg in args {
        result = eval_at_depth(arg, env, depth + 1)?;
        if result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(result)
}
