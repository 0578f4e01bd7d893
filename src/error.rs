//! Error types surfaced by the lexer/parser and by the evaluator.
//!
//! Neither error type reaches for `thiserror`: each is a plain enum with a
//! hand-written `Display` and `std::error::Error` impl, following the same
//! shape as `CodeGenError` in the code-generation layer this crate grew out
//! of — a small closed set of variants is easier to match on at call sites
//! than a single opaque message string.

use std::fmt;

use crate::value::Value;

/// A failure to lex or parse a source string.
///
/// `position` is a byte offset into the source; callers building their own
/// diagnostics (line/column, carets under the offending token) can slice
/// the original source with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at position {}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

/// A failure raised while walking a parsed [`Program`](crate::Program).
///
/// Evaluation aborts on the first error and it propagates unchanged to the
/// caller; there is no partial result and no local recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// An identifier had no binding in the environment.
    UndefinedVariable(String),
    /// A global function name was not found in the function table.
    UnknownFunction(String),
    /// A method name was not found on the receiver's type in the function table.
    UnknownMethod(String),
    /// A function/method was called with the wrong number of arguments.
    WrongArity {
        name: String,
        expected: String,
        got: usize,
    },
    /// An operator or function received an argument of the wrong kind.
    WrongType { context: String, got: &'static str },
    /// Division or modulo by zero.
    DivisionByZero,
    /// A list or string index was out of bounds or negative.
    IndexOutOfBounds { index: i64, len: usize },
    /// A map lookup found no entry for the given key.
    MissingKey(Value),
    /// `<`, `<=`, `>`, `>=` applied to a pair of values with no defined order.
    Incomparable(&'static str, &'static str),
    /// A macro receiver evaluated to something other than a list.
    NonListReceiver(&'static str),
    /// A macro's first argument was not a bare identifier.
    MalformedMacroArgument,
    /// `matches()` was given a pattern that does not compile as a regular expression.
    InvalidRegex(String),
    /// `int`/`uint`/`double` string conversion failed to parse.
    InvalidConversion { from: &'static str, to: &'static str },
    /// The evaluator's configured step budget was exceeded.
    StepBudgetExceeded,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UndefinedVariable(name) => {
                write!(f, "undefined variable: {name}")
            }
            EvalError::UnknownFunction(name) => write!(f, "unknown function: {name}"),
            EvalError::UnknownMethod(name) => write!(f, "unknown method: {name}"),
            EvalError::WrongArity {
                name,
                expected,
                got,
            } => write!(
                f,
                "{name}: expected {expected} argument(s), got {got}"
            ),
            EvalError::WrongType { context, got } => {
                write!(f, "{context}: unexpected type {got}")
            }
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            EvalError::MissingKey(key) => write!(f, "no such key: {key}"),
            EvalError::Incomparable(a, b) => {
                write!(f, "values of type {a} and {b} are not comparable")
            }
            EvalError::NonListReceiver(got) => {
                write!(f, "macro receiver must be a list, got {got}")
            }
            EvalError::MalformedMacroArgument => {
                write!(f, "macro's first argument must be a bare identifier")
            }
            EvalError::InvalidRegex(pat) => write!(f, "invalid regular expression: {pat}"),
            EvalError::InvalidConversion { from, to } => {
                write!(f, "cannot convert {from} to {to}")
            }
            EvalError::StepBudgetExceeded => write!(f, "evaluation step budget exceeded"),
        }
    }
}

impl std::error::Error for EvalError {}
