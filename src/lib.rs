//! Verdin - a small Lisp-family interpreter
//!
//! This crate implements a minimal Lisp dialect: a reader that turns text into
//! s-expression trees, an environment model with lexically chained frames, and
//! an evaluator that reduces expressions to values. Code and data share one
//! representation ([`ast::Value`]), so `(quote …)` hands parsed source straight
//! back to the program.
//!
//! ```scheme
//! (define (make-adder n) (lambda (x) (+ x n)))
//! ((make-adder 5) 3)        ; => 8
//! (let ((a 1) (b 2)) (+ a b))
//! '(this list is data)
//! ```
//!
//! Evaluation is single-threaded and synchronous: `eval` runs a form to
//! completion or to an error before returning. Runaway recursion is cut off by
//! a depth limit and surfaces as an ordinary [`Error`] instead of blowing the
//! host stack, leaving the environment intact.
//!
//! ## Modules
//!
//! - `parser`: s-expression reading from text
//! - `ast`: the `Value` tagged union shared by parser and evaluator
//! - `env`: scope frames with parent chaining and shared ownership
//! - `evaluator`: special-form dispatch and function application
//! - `builtins`: native procedures installed in the root environment
//! - `bootstrap`: the embedded library evaluated before user code

use std::fmt;

/// Maximum nesting depth accepted by the reader. Deeper input is rejected
/// with a parse error rather than risking a host stack overflow.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum evaluation depth. Non-terminating recursion hits this limit and
/// surfaces as an `Error::Eval` while the environment stays usable.
pub const MAX_EVAL_DEPTH: usize = 1024;

/// Categorizes the different kinds of reader failures.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed literals)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF inside a list,
    /// unterminated string)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
}

/// A structured error describing a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Snippet of the input around the failure point (max 100 chars)
    pub context: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Create a `ParseError` with a context snippet extracted from the input
    /// at a given offset.
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let snippet: String = input.chars().skip(context_start).take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&snippet);
        if context_start + snippet.len() < input.len() {
            display_context.push_str("[...]");
        }
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        ParseError {
            kind,
            message: message.into(),
            context: Some(display_context),
        }
    }
}

/// Expected argument count of a procedure or special form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
    /// Inclusive range, e.g. `if` takes 2 or 3 sub-forms
    Range(usize, usize),
}

impl Arity {
    /// Check an argument count against this arity.
    pub fn accepts(self, got: usize) -> bool {
        match self {
            Arity::Exactly(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Range(lo, hi) => got >= lo && got <= hi,
        }
    }

    pub fn validate(self, got: usize, procedure: &str) -> Result<(), Error> {
        if self.accepts(got) {
            Ok(())
        } else {
            Err(Error::Arity {
                expected: self,
                got,
                procedure: Some(procedure.to_owned()),
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(lo, hi) => write!(f, "between {lo} and {hi}"),
        }
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Reader failure: unexpected token, unbalanced parentheses,
    /// unterminated or malformed literal
    Parse(ParseError),
    /// `lookup`/`set!` target not found in any enclosing frame
    UnboundSymbol(String),
    /// Application head evaluated to a non-callable value
    NotApplicable(String),
    /// Wrong argument count for a native procedure, closure or special form
    Arity {
        expected: Arity,
        got: usize,
        procedure: Option<String>,
    },
    /// A procedure received an argument of the wrong value kind
    Type(String),
    /// General evaluation failure, including depth exhaustion and `(error …)`
    Eval(String),
}

impl Error {
    /// Create an arity error without naming the procedure
    pub fn arity(expected: Arity, got: usize) -> Self {
        Error::Arity {
            expected,
            got,
            procedure: None,
        }
    }

    /// Create an arity error naming the offending procedure or form
    pub fn arity_for(procedure: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::Arity {
            expected,
            got,
            procedure: Some(procedure.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundSymbol(name) => write!(f, "Unbound symbol: {name}"),
            Error::NotApplicable(value) => write!(f, "Not applicable: {value}"),
            Error::Arity {
                expected,
                got,
                procedure,
            } => match procedure {
                Some(name) => write!(
                    f,
                    "ArityError: {name} expected {expected} argument(s), got {got}"
                ),
                None => write!(f, "ArityError: expected {expected} argument(s), got {got}"),
            },
            Error::Type(msg) => write!(f, "Type error: {msg}"),
            Error::Eval(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod bootstrap;
pub mod builtins;
pub mod env;
pub mod evaluator;
pub mod parser;
