//! Tailwalk - a tree-walking evaluator for a small Lisp
//!
//! This crate turns a parsed expression tree into a value by resolving symbols,
//! dispatching special forms and applying functions. Tail positions are evaluated
//! by an explicit trampoline, so self-recursive functions written in tail form run
//! in constant host stack space.
//!
//! ```text
//! (def! sum (fn* (n acc) (if (= n 0) acc (sum (- n 1) (+ n acc)))))
//! (sum 100000 0)              ; no stack growth
//! (let* (a 1 b (+ a 1)) b)    ; sequential bindings
//! ((λ (x) (* x x)) 4)         ; λ is an alias for fn*
//! ```
//!
//! ## Special forms
//!
//! `def!`, `let*`, `do`, `if` and `fn*` (alias `λ`). Only `nil` and `false` are falsy.
//!
//! ## Values
//!
//! Integers, symbols (`:`-prefixed symbols are self-evaluating keywords), lists,
//! vectors, hashmaps (kept as a flat key/value sequence), `nil`, booleans, native
//! functions and closures.
//!
//! ## Modules
//!
//! - `ast`: the value model and its printed form
//! - `evaluator`: environments, special forms and the evaluation loop
//! - `builtinops`: host-native functions installed in the root environment
//! - `reader`: text to value tree (feature `reader`)

use std::fmt;

use crate::ast::Value;
use crate::evaluator::Arity;

/// Maximum reader nesting depth, protecting the recursive descent parser
pub const MAX_PARSE_DEPTH: usize = 64;

/// Default maximum depth of non-tail evaluation.
/// Tail calls do not count against this limit.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (unclosed brackets)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
    /// Implementation-imposed limit exceeded (integer overflow)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 60 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with a context snippet extracted from `input` around `offset`
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 60;

        let start = offset.saturating_sub(20);
        let snippet: String = input.chars().skip(start).take(MAX_CONTEXT).collect();

        let mut context = String::new();
        if start > 0 {
            context.push_str("[...]");
        }
        context.push_str(&snippet);
        if start + snippet.chars().count() < input.chars().count() {
            context.push_str("[...]");
        }
        let context = context.replace('\n', "\\n").replace('\r', "");

        let found = input.chars().nth(offset).map(|c| c.to_string());

        Self::new(kind, message, Some(context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// No frame in the environment chain binds the symbol
    UnresolvedSymbol(String),
    /// A special form was used with the wrong operand count or shape
    SpecialFormSyntaxError(String),
    /// The head of an application evaluated to something that cannot be called
    NotCallable(Value),
    ArityMismatch {
        expected: Arity,
        got: usize,
    },
    TypeError(String),
    EvalError(String),
}

impl Error {
    pub fn arity_mismatch(expected: Arity, got: usize) -> Self {
        Error::ArityMismatch { expected, got }
    }

    pub(crate) fn syntax(form_name: &str) -> Self {
        Error::SpecialFormSyntaxError(form_name.to_owned())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnresolvedSymbol(name) => write!(f, "Unresolved symbol: '{name}' not found"),
            Error::SpecialFormSyntaxError(form) => write!(f, "Invalid syntax for `{form}`"),
            Error::NotCallable(value) => write!(f, "'{value}' is not a function"),
            Error::ArityMismatch { expected, got } => {
                write!(f, "ArityError: expected {expected} arguments, got {got}")
            }
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::ParseError(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::EvalError(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::EvalError(msg.to_owned())
    }
}

/// Read, evaluate and print a single line of source text in `env`.
///
/// Blank input short-circuits to an empty string without touching the
/// environment. Errors from any stage are returned to the caller, which
/// is expected to report them and carry on with the next line.
#[cfg(feature = "reader")]
pub fn rep(input: &str, env: &evaluator::Environment) -> Result<String, Error> {
    match reader::parse(input)? {
        None => Ok(String::new()),
        Some(expr) => {
            let value = evaluator::evaluate(&expr, env)?;
            Ok(value.to_string())
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;

#[cfg(feature = "reader")]
pub mod reader;
