//! Core expression tree and runtime value types. The language is homoiconic:
//! the [`Value`] enum is both the parser's output and what the evaluator
//! produces, covering atoms (symbols, numbers, strings, booleans), the empty
//! list, cons pairs, user closures and native procedures. Helper constructors
//! such as [`val`], [`sym`] and [`nil`] plus `From` conversions for common
//! Rust types make building expressions in code and tests ergonomic. Display
//! logic matches the surface syntax, including dotted-pair notation for
//! improper lists.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::builtins::NativeProc;
use crate::env::Environment;
use crate::{Arity, Error};

/// Numeric values: exact integers and inexact floats. Arithmetic promotes to
/// float as soon as one operand is a float; integer overflow is an error
/// rather than a silent wrap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    pub fn checked_add(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_add(b)
                .map(Number::Int)
                .ok_or_else(|| Error::Eval("integer overflow in addition".into())),
            (a, b) => Ok(Number::Float(a.as_f64() + b.as_f64())),
        }
    }

    pub fn checked_sub(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_sub(b)
                .map(Number::Int)
                .ok_or_else(|| Error::Eval("integer overflow in subtraction".into())),
            (a, b) => Ok(Number::Float(a.as_f64() - b.as_f64())),
        }
    }

    pub fn checked_mul(self, other: Number) -> Result<Number, Error> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a
                .checked_mul(b)
                .map(Number::Int)
                .ok_or_else(|| Error::Eval("integer overflow in multiplication".into())),
            (a, b) => Ok(Number::Float(a.as_f64() * b.as_f64())),
        }
    }

    /// Division stays exact while it can: two integers that divide evenly
    /// produce an integer, everything else produces a float. Division by an
    /// exact zero is an error.
    pub fn checked_div(self, other: Number) -> Result<Number, Error> {
        if let Number::Int(0) = other {
            return Err(Error::Eval("division by zero".into()));
        }
        match (self, other) {
            // checked_rem also rules out the i64::MIN / -1 overflow
            (Number::Int(a), Number::Int(b)) if a.checked_rem(b) == Some(0) => {
                Ok(Number::Int(a / b))
            }
            (a, b) => Ok(Number::Float(a.as_f64() / b.as_f64())),
        }
    }

    pub fn checked_neg(self) -> Result<Number, Error> {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map(Number::Int)
                .ok_or_else(|| Error::Eval("integer overflow in negation".into())),
            Number::Float(x) => Ok(Number::Float(-x)),
        }
    }

    /// Numeric equality across exactness: `(= 1 1.0)` holds even though
    /// `equal?` distinguishes the representations.
    pub fn num_eq(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    /// Ordering for the comparison procedures. `None` only for NaN operands.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
        }
    }
}

/// An immutable two-slot cons cell. Proper lists are pair chains whose final
/// cdr is [`Value::Nil`]; anything else in the final cdr makes the list
/// improper (printed in dotted notation).
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

/// Parameter list of a closure: fixed names plus an optional rest name that
/// collects trailing arguments into a proper list.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub required: Vec<String>,
    pub rest: Option<String>,
}

impl Params {
    pub fn arity(&self) -> Arity {
        if self.rest.is_some() {
            Arity::AtLeast(self.required.len())
        } else {
            Arity::Exactly(self.required.len())
        }
    }
}

/// A user-defined function: parameter spec, body expressions (evaluated with
/// `begin` semantics) and the environment captured at creation. The
/// environment reference is shared, not owned: the frame lives as long as the
/// longest-living closure or in-flight call that holds it.
#[derive(Debug, Clone)]
pub struct Closure {
    pub params: Params,
    pub body: Vec<Value>,
    pub env: Environment,
}

/// Core expression/value type of the interpreter.
///
/// To build values in code, use the helper functions:
/// - `val(42)`, `val("text")`, `val(true)` for atoms
/// - `sym("name")` for symbols, `nil()` for the empty list
/// - `Value::list([...])` for proper lists, `Value::cons` for raw pairs
#[derive(Debug, Clone)]
pub enum Value {
    /// Interned-by-name identifier, case-sensitive
    Symbol(String),
    /// Integer or floating-point number
    Number(Number),
    /// String literal
    String(String),
    /// `#t` / `#f`
    Bool(bool),
    /// The empty-list sentinel
    Nil,
    /// Cons cell
    Pair(Rc<Pair>),
    /// User-defined function
    Closure(Rc<Closure>),
    /// Host-implemented procedure from the builtin registry
    Native(&'static NativeProc),
    /// Unit value returned by `define`/`set!`; never printed by the REPL and
    /// never equal to anything, itself included
    Unspecified,
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(Pair { car, cdr }))
    }

    /// Build a proper list terminated by `Nil`.
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        Value::list_with_tail(items, Value::Nil)
    }

    /// Build a pair chain over `items` ending in `tail` (dotted when the tail
    /// is not `Nil`).
    pub fn list_with_tail<I>(items: I, tail: Value) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(tail, |acc, item| Value::cons(item, acc))
    }

    /// Iterate the cars of the leading pair chain. Stops at the first
    /// non-pair cdr; use [`Value::to_vec`] when properness matters.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter { current: self }
    }

    /// Collect a proper list into a vector. Returns `None` for improper
    /// lists and non-list values (`Nil` yields an empty vector).
    pub fn to_vec(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self;
        loop {
            match current {
                Value::Nil => return Some(items),
                Value::Pair(p) => {
                    items.push(p.car.clone());
                    current = &p.cdr;
                }
                _ => return None,
            }
        }
    }

    /// Every value except `#f` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Value-kind name used in type error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Symbol(_) => "symbol",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "closure",
            Value::Native(_) => "native procedure",
            Value::Unspecified => "unspecified",
        }
    }
}

/// Iterator over the cars of a pair chain.
pub struct ListIter<'a> {
    current: &'a Value,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        match self.current {
            Value::Pair(p) => {
                self.current = &p.cdr;
                Some(&p.car)
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Pair(a), Value::Pair(b)) => a == b,
            // Closures compare by identity: the captured environment may
            // reference the closure itself, so structural comparison could
            // never terminate.
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => std::ptr::eq(*a, *b),
            (Value::Unspecified, _) | (_, Value::Unspecified) => false,
            _ => false,
        }
    }
}

// From trait implementations for Value - enables .into() conversion

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::Int(n.into()))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(Number::Float(x))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::list(arr.into_iter().map(Into::into).collect::<Vec<_>>())
    }
}

/// Helper function for creating symbols - works great in mixed lists
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating values from any convertible Rust type
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// The empty list
pub fn nil() -> Value {
    Value::Nil
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Nil => write!(f, "()"),
            Value::Pair(pair) => {
                write!(f, "({}", pair.car)?;
                let mut current = &pair.cdr;
                loop {
                    match current {
                        Value::Pair(p) => {
                            write!(f, " {}", p.car)?;
                            current = &p.cdr;
                        }
                        Value::Nil => return write!(f, ")"),
                        tail => return write!(f, " . {tail})"),
                    }
                }
            }
            Value::Closure(_) => write!(f, "#<closure>"),
            Value::Native(proc) => write!(f, "#<native:{}>", proc.name),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}
