//! The closed set of AST node variants CEL expressions parse into. Nodes
//! are created by the parser, owned by a [`Program`] (see `lib.rs`), and
//! are immutable thereafter — evaluation never mutates an `Expr`.

use crate::value::Value;

/// How a [`Expr::Literal`] was spelled in the source. Carried alongside the
/// already-decoded `Value` so the evaluator never needs to re-derive it
/// (e.g. to distinguish a `uint` literal's value from an `int` literal with
/// the same magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    In,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value, LiteralKind),
    Identifier(String),
    Select {
        operand: Option<Box<Expr>>,
        field: String,
        is_test: bool,
    },
    Call {
        target: Option<Box<Expr>>,
        name: String,
        args: Vec<Expr>,
        is_macro: bool,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Struct {
        type_name: Option<String>,
        fields: Vec<(String, Expr)>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    /// The generalized accumulator-loop shape the evaluator desugars the
    /// five macro `Call` nodes into (see `eval.rs::expand_macro`). Not
    /// produced directly by the parser; see DESIGN.md for why this variant
    /// exists in the closed set without a dedicated grammar production.
    Comprehension {
        iter_var: String,
        iter_range: Box<Expr>,
        accu_var: String,
        accu_init: Box<Expr>,
        loop_cond: Box<Expr>,
        loop_step: Box<Expr>,
        result: Box<Expr>,
    },
}

/// The five method-call names the evaluator intercepts before dispatching
/// to the function table.
pub const MACRO_NAMES: &[&str] = &["map", "filter", "all", "exists", "existsOne"];

pub fn is_macro_name(name: &str) -> bool {
    MACRO_NAMES.contains(&name)
}
