//! A parser and tree-walking evaluator for Common Expression Language (CEL)
//! expressions.
//!
//! ```
//! use std::collections::HashMap;
//! use cel::{compile, Value};
//!
//! let program = compile("age >= 18 && hasLicense").unwrap();
//! let mut bindings = HashMap::new();
//! bindings.insert("age".to_string(), Value::Int(21));
//! bindings.insert("hasLicense".to_string(), Value::Bool(true));
//! assert_eq!(program.evaluate(&bindings).unwrap(), Value::Bool(true));
//! ```
//!
//! The crate has three layers, each in its own module: [`lexer`]/[`parser`]
//! turn source text into an [`ast::Expr`] tree, [`value`] defines the
//! dynamic values expressions evaluate to, and [`eval`] walks the tree
//! against a binding environment and a [`functions::FunctionTable`]. There
//! is no I/O and no logging in this crate — evaluation is a pure function
//! of (expression, bindings, function table).

pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

use std::collections::HashMap;

pub use ast::Expr;
pub use error::{EvalError, ParseError};
pub use eval::Evaluator;
pub use functions::{DelegatingFunctions, FunctionTable, StandardFunctions};
pub use value::{Value, ValueMap};

/// A parsed, immutable CEL expression, ready to be evaluated against any
/// number of binding environments.
#[derive(Debug, Clone)]
pub struct Program {
    expr: Expr,
}

impl Program {
    /// Evaluate against `bindings` using the standard function library.
    pub fn evaluate(&self, bindings: &HashMap<String, Value>) -> Result<Value, EvalError> {
        let functions = StandardFunctions;
        Evaluator::new(&functions).eval(&self.expr, bindings)
    }

    /// Evaluate against `bindings` using a caller-supplied function table,
    /// for embedders that need custom global functions or method
    /// overrides.
    pub fn evaluate_with(
        &self,
        bindings: &HashMap<String, Value>,
        functions: &dyn FunctionTable,
    ) -> Result<Value, EvalError> {
        Evaluator::new(functions).eval(&self.expr, bindings)
    }

    /// The root of the parsed expression tree, for callers that want to
    /// inspect or statically analyze it rather than evaluate it.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

/// Parse a CEL expression into a reusable [`Program`].
pub fn compile(source: &str) -> Result<Program, ParseError> {
    let expr = parser::parse(source)?;
    Ok(Program { expr })
}

/// Parse and evaluate `source` in one step, for callers that do not need to
/// reuse the parsed expression across multiple binding environments.
pub fn eval(source: &str, bindings: &HashMap<String, Value>) -> Result<Value, EvalError> {
    let program = compile(source).map_err(|e| EvalError::WrongType {
        context: format!("parse error: {e}"),
        got: "invalid expression",
    })?;
    program.evaluate(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_evaluates_against_fresh_bindings_each_time() {
        let program = compile("x + 1").unwrap();
        let mut b1 = HashMap::new();
        b1.insert("x".to_string(), Value::Int(1));
        let mut b2 = HashMap::new();
        b2.insert("x".to_string(), Value::Int(41));
        assert_eq!(program.evaluate(&b1).unwrap(), Value::Int(2));
        assert_eq!(program.evaluate(&b2).unwrap(), Value::Int(42));
    }

    #[test]
    fn compile_surfaces_parse_errors() {
        assert!(compile("1 +").is_err());
    }

    #[test]
    fn evaluate_with_custom_function_table() {
        let program = compile("double(x)").unwrap();
        let functions =
            DelegatingFunctions::new().with_function("double", |args| {
                let n = match &args[0] {
                    Value::Int(i) => *i,
                    other => {
                        return Err(EvalError::WrongType {
                            context: "double()".into(),
                            got: other.type_name(),
                        })
                    }
                };
                Ok(Value::Int(n * 2))
            });
        let mut bindings = HashMap::new();
        bindings.insert("x".to_string(), Value::Int(21));
        assert_eq!(
            program.evaluate_with(&bindings, &functions).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn convenience_eval_function() {
        let bindings = HashMap::new();
        assert_eq!(eval("2 + 3 * 4", &bindings).unwrap(), Value::Int(14));
    }
}
