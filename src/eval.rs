//! The tree-walking evaluator and the immutable binding environment it
//! walks the AST against.
//!
//! The environment is an overlay chain rather than a mutable map with
//! explicit save/restore: each macro iteration pushes one borrowed frame,
//! and Rust's ownership rules drop it automatically on every exit path
//! (including the error path), giving macro hygiene for free — there is
//! nothing to get wrong here because there is no explicit restore to
//! forget.

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::ast::{BinaryOp, Expr, LiteralKind, UnaryOp};
use crate::error::EvalError;
use crate::functions::FunctionTable;
use crate::value::{compare, Value, ValueMap};

/// An immutable binding environment: a caller-supplied root map, optionally
/// shadowed by a chain of macro-scoped overlays.
pub enum Bindings<'a> {
    Root(&'a HashMap<String, Value>),
    Overlay {
        parent: &'a Bindings<'a>,
        name: &'a str,
        value: Value,
    },
}

impl<'a> Bindings<'a> {
    pub fn root(map: &'a HashMap<String, Value>) -> Self {
        Bindings::Root(map)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            Bindings::Root(map) => map.get(name).cloned(),
            Bindings::Overlay { parent, name: n, value } => {
                if *n == name {
                    Some(value.clone())
                } else {
                    parent.get(name)
                }
            }
        }
    }

    pub fn overlay<'b>(&'b self, name: &'b str, value: Value) -> Bindings<'b>
    where
        'a: 'b,
    {
        Bindings::Overlay {
            parent: self,
            name,
            value,
        }
    }

    /// Materializes the whole chain as a `Value::Map`, used by `Select`
    /// nodes with no operand: the environment itself acts as the implicit
    /// map.
    fn as_map_value(&self) -> Value {
        let mut seen = ValueMap::new();
        let mut frame = self;
        loop {
            match frame {
                Bindings::Overlay { parent, name, value } => {
                    if !seen.contains_key(&Value::string(*name)) {
                        seen.insert(Value::string(*name), value.clone());
                    }
                    frame = parent;
                }
                Bindings::Root(map) => {
                    for (k, v) in map.iter() {
                        if !seen.contains_key(&Value::string(k.as_str())) {
                            seen.insert(Value::string(k.as_str()), v.clone());
                        }
                    }
                    break;
                }
            }
        }
        Value::map(seen)
    }
}

const ACCU_VAR: &str = "__result__";

/// Walks a parsed [`Expr`] against an environment and a function table.
pub struct Evaluator<'f> {
    functions: &'f dyn FunctionTable,
    max_steps: Option<u64>,
    steps: Cell<u64>,
}

impl<'f> Evaluator<'f> {
    pub fn new(functions: &'f dyn FunctionTable) -> Self {
        Evaluator {
            functions,
            max_steps: None,
            steps: Cell::new(0),
        }
    }

    /// Bound the number of AST nodes this evaluator will visit before
    /// failing with [`EvalError::StepBudgetExceeded`]. Unset by default —
    /// this is an optional enrichment, not a built-in limit.
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn eval(&self, expr: &Expr, bindings: &HashMap<String, Value>) -> Result<Value, EvalError> {
        self.steps.set(0);
        let env = Bindings::root(bindings);
        self.eval_expr(expr, &env)
    }

    fn tick(&self) -> Result<(), EvalError> {
        if let Some(max) = self.max_steps {
            let n = self.steps.get() + 1;
            self.steps.set(n);
            if n > max {
                return Err(EvalError::StepBudgetExceeded);
            }
        }
        Ok(())
    }

    fn eval_expr(&self, expr: &Expr, env: &Bindings) -> Result<Value, EvalError> {
        self.tick()?;
        match expr {
            Expr::Literal(value, _kind) => Ok(value.clone()),
            Expr::Identifier(name) => env
                .get(name)
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expr::Select { operand, field, is_test } => {
                let target = match operand {
                    Some(e) => self.eval_expr(e, env)?,
                    None => env.as_map_value(),
                };
                self.eval_select(&target, field, *is_test)
            }
            Expr::Index { operand, index } => {
                let target = self.eval_expr(operand, env)?;
                let idx = self.eval_expr(index, env)?;
                self.eval_index(&target, &idx)
            }
            Expr::Unary { op, operand } => {
                let v = self.eval_expr(operand, env)?;
                eval_unary(*op, &v)
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, env),
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(cond, env)?.as_bool()? {
                    self.eval_expr(then_branch, env)
                } else {
                    self.eval_expr(else_branch, env)
                }
            }
            Expr::List(elems) => {
                let mut items = Vec::with_capacity(elems.len());
                for e in elems {
                    items.push(self.eval_expr(e, env)?);
                }
                Ok(Value::list(items))
            }
            Expr::Map(entries) => {
                let mut map = ValueMap::new();
                for (k, v) in entries {
                    let key = self.eval_expr(k, env)?;
                    let value = self.eval_expr(v, env)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Struct { type_name, fields } => {
                // Protobuf message construction is out of scope; a struct
                // literal evaluates to a plain map carrying its declared
                // type name, enough for equality/field-access without a
                // message registry.
                let mut map = ValueMap::new();
                if let Some(t) = type_name {
                    map.insert(Value::string("__type__"), Value::string(t.clone()));
                }
                for (name, expr) in fields {
                    let value = self.eval_expr(expr, env)?;
                    map.insert(Value::string(name.clone()), value);
                }
                Ok(Value::map(map))
            }
            Expr::Call {
                target,
                name,
                args,
                is_macro,
            } => self.eval_call(target.as_deref(), name, args, *is_macro, env),
            Expr::Comprehension {
                iter_var,
                iter_range,
                accu_var,
                accu_init,
                loop_cond,
                loop_step,
                result,
            } => {
                let range = self.eval_expr(iter_range, env)?;
                let items = range.as_list()?.clone();
                self.run_comprehension(
                    iter_var, &items, accu_var, accu_init, loop_cond, loop_step, result, env,
                )
            }
        }
    }

    fn eval_select(&self, target: &Value, field: &str, is_test: bool) -> Result<Value, EvalError> {
        match target {
            Value::Map(map) => match map.get(&Value::string(field)) {
                Some(v) => Ok(v.clone()),
                None if is_test => Ok(Value::Bool(false)),
                None => Err(EvalError::MissingKey(Value::string(field))),
            },
            Value::Null if is_test => Ok(Value::Bool(false)),
            Value::Null => Err(EvalError::WrongType {
                context: format!("select '{field}' on null"),
                got: "null",
            }),
            other => Err(EvalError::WrongType {
                context: format!("select '{field}'"),
                got: other.type_name(),
            }),
        }
    }

    fn eval_index(&self, target: &Value, index: &Value) -> Result<Value, EvalError> {
        match target {
            Value::List(items) => {
                let idx = as_index(index)?;
                if idx < 0 || idx as usize >= items.len() {
                    return Err(EvalError::IndexOutOfBounds {
                        index: idx,
                        len: items.len(),
                    });
                }
                Ok(items[idx as usize].clone())
            }
            Value::Map(map) => map
                .get(index)
                .cloned()
                .ok_or_else(|| EvalError::MissingKey(index.clone())),
            Value::String(s) => {
                let idx = as_index(index)?;
                let chars: Vec<char> = s.chars().collect();
                if idx < 0 || idx as usize >= chars.len() {
                    return Err(EvalError::IndexOutOfBounds {
                        index: idx,
                        len: chars.len(),
                    });
                }
                Ok(Value::string(chars[idx as usize].to_string()))
            }
            Value::Null => Err(EvalError::WrongType {
                context: "index on null".into(),
                got: "null",
            }),
            other => Err(EvalError::WrongType {
                context: "index".into(),
                got: other.type_name(),
            }),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        env: &Bindings,
    ) -> Result<Value, EvalError> {
        match op {
            BinaryOp::LogicalAnd => {
                let l = self.eval_expr(left, env)?.as_bool()?;
                if !l {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval_expr(right, env)?.as_bool()?;
                Ok(Value::Bool(r))
            }
            BinaryOp::LogicalOr => {
                let l = self.eval_expr(left, env)?.as_bool()?;
                if l {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval_expr(right, env)?.as_bool()?;
                Ok(Value::Bool(r))
            }
            _ => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                eval_binary_values(op, &l, &r)
            }
        }
    }

    fn eval_call(
        &self,
        target: Option<&Expr>,
        name: &str,
        args: &[Expr],
        is_macro: bool,
        env: &Bindings,
    ) -> Result<Value, EvalError> {
        if is_macro {
            let Some(target) = target else {
                return Err(EvalError::MalformedMacroArgument);
            };
            if args.len() != 2 {
                return Err(EvalError::MalformedMacroArgument);
            }
            let iter_var = match &args[0] {
                Expr::Identifier(n) => n.clone(),
                _ => return Err(EvalError::MalformedMacroArgument),
            };
            let body = &args[1];

            let receiver = self.eval_expr(target, env)?;
            let items = match &receiver {
                Value::List(items) => items.clone(),
                other => return Err(EvalError::NonListReceiver(other.type_name())),
            };

            let (accu_init, loop_cond, loop_step, result) = expand_macro(name, &iter_var, body)?;
            return self.run_comprehension(
                &iter_var, &items, ACCU_VAR, &accu_init, &loop_cond, &loop_step, &result, env,
            );
        }

        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.eval_expr(a, env)?);
        }

        match target {
            Some(t) => {
                let receiver = self.eval_expr(t, env)?;
                self.functions.call_method(&receiver, name, &values)
            }
            None => self.functions.call(name, &values),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_comprehension(
        &self,
        iter_var: &str,
        items: &[Value],
        accu_var: &str,
        accu_init: &Expr,
        loop_cond: &Expr,
        loop_step: &Expr,
        result: &Expr,
        env: &Bindings,
    ) -> Result<Value, EvalError> {
        let mut accu = self.eval_expr(accu_init, env)?;
        for item in items {
            let env_iter = env.overlay(iter_var, item.clone());
            let env_full = env_iter.overlay(accu_var, accu.clone());
            let cond = self.eval_expr(loop_cond, &env_full)?.as_bool()?;
            if !cond {
                break;
            }
            accu = self.eval_expr(loop_step, &env_full)?;
        }
        let final_env = env.overlay(accu_var, accu);
        self.eval_expr(result, &final_env)
    }
}

fn as_index(v: &Value) -> Result<i64, EvalError> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Uint(u) => Ok(*u as i64),
        other => Err(EvalError::WrongType {
            context: "index".into(),
            got: other.type_name(),
        }),
    }
}

fn eval_unary(op: UnaryOp, v: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.as_bool()?)),
        UnaryOp::Negate => match v {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or(EvalError::WrongType {
                    context: "negate overflow".into(),
                    got: "int",
                }),
            Value::Double(d) => Ok(Value::Double(-d)),
            other => Err(EvalError::WrongType {
                context: "unary '-'".into(),
                got: other.type_name(),
            }),
        },
    }
}

fn eval_binary_values(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => binary_add(l, r),
        BinaryOp::Subtract => numeric_binop("-", l, r, i64::checked_sub, u64::checked_sub, |a, b| a - b),
        BinaryOp::Multiply => binary_multiply(l, r),
        BinaryOp::Divide => binary_divide(l, r),
        BinaryOp::Modulo => binary_modulo(l, r),
        BinaryOp::Equal => Ok(Value::Bool(l == r)),
        BinaryOp::NotEqual => Ok(Value::Bool(l != r)),
        BinaryOp::Less => Ok(Value::Bool(compare(l, r)? == Ordering::Less)),
        BinaryOp::LessEqual => Ok(Value::Bool(compare(l, r)? != Ordering::Greater)),
        BinaryOp::Greater => Ok(Value::Bool(compare(l, r)? == Ordering::Greater)),
        BinaryOp::GreaterEqual => Ok(Value::Bool(compare(l, r)? != Ordering::Less)),
        BinaryOp::In => binary_in(l, r),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            unreachable!("short-circuit operators are handled in eval_binary")
        }
    }
}

fn binary_add(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if l.is_numeric() && r.is_numeric() {
        return numeric_binop("+", l, r, i64::checked_add, u64::checked_add, |a, b| a + b);
    }
    if let (Value::List(a), Value::List(b)) = (l, r) {
        let mut out = (**a).clone();
        out.extend(b.iter().cloned());
        return Ok(Value::list(out));
    }
    if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
        return Ok(Value::string(format!("{}{}", l.stringify(), r.stringify())));
    }
    Err(EvalError::WrongType {
        context: "+".into(),
        got: mismatched_operand(l, r),
    })
}

fn binary_multiply(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::String(s), n) | (n, Value::String(s)) if n.is_numeric() => {
            let count = repeat_count(n)?;
            Ok(Value::string(s.repeat(count)))
        }
        (Value::List(items), n) | (n, Value::List(items)) if n.is_numeric() => {
            let count = repeat_count(n)?;
            let mut out = Vec::with_capacity(items.len() * count);
            for _ in 0..count {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        _ if l.is_numeric() && r.is_numeric() => {
            numeric_binop("*", l, r, i64::checked_mul, u64::checked_mul, |a, b| a * b)
        }
        _ => Err(EvalError::WrongType {
            context: "*".into(),
            got: mismatched_operand(l, r),
        }),
    }
}

fn repeat_count(v: &Value) -> Result<usize, EvalError> {
    let n = match v {
        Value::Int(i) => *i,
        Value::Uint(u) => *u as i64,
        _ => {
            return Err(EvalError::WrongType {
                context: "repeat count".into(),
                got: v.type_name(),
            })
        }
    };
    if n < 0 {
        return Err(EvalError::WrongType {
            context: "repeat count must be non-negative".into(),
            got: v.type_name(),
        });
    }
    Ok(n as usize)
}

fn binary_divide(l: &Value, r: &Value) -> Result<Value, EvalError> {
    let a = as_f64(l)?;
    let b = as_f64(r)?;
    if b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    Ok(Value::Double(a / b))
}

fn binary_modulo(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_rem(*b).map(Value::Int).ok_or(EvalError::DivisionByZero)
        }
        (Value::Uint(a), Value::Uint(b)) => {
            if *b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Uint(a % b))
        }
        _ => Err(EvalError::WrongType {
            context: "%".into(),
            got: mismatched_operand(l, r),
        }),
    }
}

fn binary_in(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match r {
        Value::List(items) => Ok(Value::Bool(items.iter().any(|v| v == l))),
        Value::Map(map) => Ok(Value::Bool(map.contains_key(l))),
        Value::String(s) => {
            let needle = l.as_str()?;
            Ok(Value::Bool(s.contains(needle)))
        }
        other => Err(EvalError::WrongType {
            context: "'in' right-hand side".into(),
            got: other.type_name(),
        }),
    }
}

fn as_f64(v: &Value) -> Result<f64, EvalError> {
    match v {
        Value::Int(i) => Ok(*i as f64),
        Value::Uint(u) => Ok(*u as f64),
        Value::Double(d) => Ok(*d),
        other => Err(EvalError::WrongType {
            context: "expected number".into(),
            got: other.type_name(),
        }),
    }
}

/// Shared promotion for `+`, `-`, `*`: both-double promotes to double,
/// both-int uses checked i64 arithmetic, both-uint uses checked u64
/// arithmetic. Mixed int/uint (neither side a double) is a type error —
/// implicit cross-type promotion is scoped to int↔double only (see
/// DESIGN.md).
fn numeric_binop(
    op: &str,
    l: &Value,
    r: &Value,
    f_i64: impl Fn(i64, i64) -> Option<i64>,
    f_u64: impl Fn(u64, u64) -> Option<u64>,
    f_f64: impl Fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    let overflow = || EvalError::WrongType {
        context: format!("{op}: arithmetic overflow"),
        got: "int",
    };
    match (l, r) {
        (Value::Double(_), _) | (_, Value::Double(_)) => {
            Ok(Value::Double(f_f64(as_f64(l)?, as_f64(r)?)))
        }
        (Value::Int(a), Value::Int(b)) => f_i64(*a, *b).map(Value::Int).ok_or_else(overflow),
        (Value::Uint(a), Value::Uint(b)) => f_u64(*a, *b).map(Value::Uint).ok_or_else(overflow),
        _ => Err(EvalError::WrongType {
            context: format!("{op}: mixed int/uint operands"),
            got: mismatched_operand(l, r),
        }),
    }
}

fn mismatched_operand(l: &Value, r: &Value) -> &'static str {
    if l.is_numeric() {
        r.type_name()
    } else {
        l.type_name()
    }
}

/// Desugars one of the five macro names into the generalized accumulator
/// loop shape `Expr::Comprehension` exists for (see DESIGN.md). `accu_var`
/// is always `__result__`: nesting is still hygienic because each
/// comprehension's overlay frame shadows and then drops independently of
/// any outer one, regardless of name collisions.
fn expand_macro(
    macro_name: &str,
    iter_var: &str,
    body: &Expr,
) -> Result<(Expr, Expr, Expr, Expr), EvalError> {
    let accu = || Expr::Identifier(ACCU_VAR.to_string());
    let lit_bool = |b: bool| Expr::Literal(Value::Bool(b), LiteralKind::Bool);
    let lit_int = |i: i64| Expr::Literal(Value::Int(i), LiteralKind::Int);

    Ok(match macro_name {
        "map" => (
            Expr::List(vec![]),
            lit_bool(true),
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(accu()),
                right: Box::new(Expr::List(vec![body.clone()])),
            },
            accu(),
        ),
        "filter" => (
            Expr::List(vec![]),
            lit_bool(true),
            Expr::Conditional {
                cond: Box::new(body.clone()),
                then_branch: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(accu()),
                    right: Box::new(Expr::List(vec![Expr::Identifier(iter_var.to_string())])),
                }),
                else_branch: Box::new(accu()),
            },
            accu(),
        ),
        "all" => (
            lit_bool(true),
            accu(),
            Expr::Binary {
                op: BinaryOp::LogicalAnd,
                left: Box::new(accu()),
                right: Box::new(body.clone()),
            },
            accu(),
        ),
        "exists" => (
            lit_bool(false),
            Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(accu()),
            },
            Expr::Binary {
                op: BinaryOp::LogicalOr,
                left: Box::new(accu()),
                right: Box::new(body.clone()),
            },
            accu(),
        ),
        "existsOne" => (
            lit_int(0),
            Expr::Binary {
                op: BinaryOp::LessEqual,
                left: Box::new(accu()),
                right: Box::new(lit_int(1)),
            },
            Expr::Conditional {
                cond: Box::new(body.clone()),
                then_branch: Box::new(Expr::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(accu()),
                    right: Box::new(lit_int(1)),
                }),
                else_branch: Box::new(accu()),
            },
            Expr::Binary {
                op: BinaryOp::Equal,
                left: Box::new(accu()),
                right: Box::new(lit_int(1)),
            },
        ),
        other => return Err(EvalError::UnknownMethod(other.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::StandardFunctions;
    use crate::parser::parse;

    fn eval_src(src: &str, bindings: &HashMap<String, Value>) -> Result<Value, EvalError> {
        let expr = parse(src).expect("parse");
        let functions = StandardFunctions;
        let evaluator = Evaluator::new(&functions);
        evaluator.eval(&expr, bindings)
    }

    #[test]
    fn arithmetic_precedence() {
        let b = HashMap::new();
        assert_eq!(eval_src("2 + 3 * 4", &b).unwrap(), Value::Int(14));
        assert_eq!(eval_src("(2 + 3) * 4", &b).unwrap(), Value::Int(20));
    }

    #[test]
    fn int_division_always_yields_double() {
        let b = HashMap::new();
        match eval_src("10 / 3", &b).unwrap() {
            Value::Double(d) => assert_eq!(d, 10.0 / 3.0),
            other => panic!("expected double, got {other:?}"),
        }
    }

    #[test]
    fn string_concatenation_with_binding() {
        let mut b = HashMap::new();
        b.insert("name".to_string(), Value::string("World"));
        assert_eq!(
            eval_src(r#""Hello, " + name"#, &b).unwrap(),
            Value::string("Hello, World")
        );
    }

    #[test]
    fn ternary_with_and() {
        let mut b = HashMap::new();
        b.insert("age".to_string(), Value::Int(25));
        b.insert("hasLicense".to_string(), Value::Bool(true));
        assert_eq!(
            eval_src(
                r#"age >= 18 && hasLicense ? "can drive" : "cannot drive""#,
                &b
            )
            .unwrap(),
            Value::string("can drive")
        );
    }

    #[test]
    fn filter_then_map() {
        let b = HashMap::new();
        let result = eval_src("[1, 2, 3, 4, 5].filter(x, x > 2).map(x, x * 10)", &b).unwrap();
        assert_eq!(
            result,
            Value::list(vec![Value::Int(30), Value::Int(40), Value::Int(50)])
        );
    }

    #[test]
    fn has_on_map() {
        let b = HashMap::new();
        let mut user = ValueMap::new();
        user.insert(Value::string("name"), Value::string("Alice"));
        user.insert(Value::string("email"), Value::string("a@b"));
        let mut env = b.clone();
        env.insert("user".to_string(), Value::map(user));
        assert_eq!(
            eval_src(r#"has(user, "email")"#, &env).unwrap(),
            Value::Bool(true)
        );

        let mut user2 = ValueMap::new();
        user2.insert(Value::string("name"), Value::string("Alice"));
        let mut env2 = HashMap::new();
        env2.insert("user".to_string(), Value::map(user2));
        assert_eq!(
            eval_src(r#"has(user, "email")"#, &env2).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn matches_regex() {
        let b = HashMap::new();
        assert_eq!(
            eval_src(r#"matches("test@example.com", ".*@.*")"#, &b).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn division_by_zero_and_undefined_variable_error() {
        let b = HashMap::new();
        assert!(eval_src("1 / 0", &b).is_err());
        let mut env = HashMap::new();
        env.insert("x".to_string(), Value::Int(1));
        assert!(eval_src("x + y", &env).is_err());
    }

    #[test]
    fn all_and_exists_macros() {
        let b = HashMap::new();
        assert_eq!(
            eval_src("[2,4,6].all(x, x % 2 == 0)", &b).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_src("[1,3,5].exists(x, x % 2 == 0)", &b).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn exists_one_counts_exactly_one_match() {
        let b = HashMap::new();
        assert_eq!(
            eval_src("[1,2,3].existsOne(x, x == 2)", &b).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_src("[1,2,2,3].existsOne(x, x == 2)", &b).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn short_circuit_and_or_never_call_functions() {
        let b = HashMap::new();
        // `fail()` is not a registered function; if either side
        // short-circuited incorrectly this would surface as an error.
        assert_eq!(eval_src("false && fail()", &b).unwrap(), Value::Bool(false));
        assert_eq!(eval_src("true || fail()", &b).unwrap(), Value::Bool(true));
    }

    #[test]
    fn macro_hygiene_restores_outer_binding() {
        let mut b = HashMap::new();
        b.insert("x".to_string(), Value::Int(99));
        let expr = parse("[1, 2, 3].map(x, x * 2)").unwrap();
        let functions = StandardFunctions;
        let evaluator = Evaluator::new(&functions);
        evaluator.eval(&expr, &b).unwrap();
        // `b` is the caller's own map and was never mutated — overlay
        // frames exist only on the Rust call stack during the macro call.
        assert_eq!(b.get("x"), Some(&Value::Int(99)));
    }

    #[test]
    fn macro_with_non_identifier_first_arg_is_malformed() {
        let b = HashMap::new();
        assert!(eval_src("[1,2].map(1 + 1, x)", &b).is_err());
    }

    #[test]
    fn macro_on_non_list_receiver_errors() {
        let b = HashMap::new();
        assert!(eval_src("(1).map(x, x)", &b).is_err());
    }

    #[test]
    fn literal_comprehension_node_evaluates_generically() {
        // Exercises `Expr::Comprehension` directly, the shape the parser's
        // macro calls desugar into at evaluation time but never construct
        // as a literal node themselves (see DESIGN.md).
        let expr = Expr::Comprehension {
            iter_var: "x".to_string(),
            iter_range: Box::new(Expr::List(vec![
                Expr::Literal(Value::Int(1), LiteralKind::Int),
                Expr::Literal(Value::Int(2), LiteralKind::Int),
                Expr::Literal(Value::Int(3), LiteralKind::Int),
            ])),
            accu_var: "acc".to_string(),
            accu_init: Box::new(Expr::Literal(Value::Int(0), LiteralKind::Int)),
            loop_cond: Box::new(Expr::Literal(Value::Bool(true), LiteralKind::Bool)),
            loop_step: Box::new(Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Identifier("acc".to_string())),
                right: Box::new(Expr::Identifier("x".to_string())),
            }),
            result: Box::new(Expr::Identifier("acc".to_string())),
        };
        let functions = StandardFunctions;
        let evaluator = Evaluator::new(&functions);
        let result = evaluator.eval(&expr, &HashMap::new()).unwrap();
        assert_eq!(result, Value::Int(6));
    }

    #[test]
    fn step_budget_aborts_runaway_evaluation() {
        let functions = StandardFunctions;
        let evaluator = Evaluator::new(&functions).with_max_steps(2);
        let expr = parse("1 + 2 + 3").unwrap();
        assert_eq!(
            evaluator.eval(&expr, &HashMap::new()),
            Err(EvalError::StepBudgetExceeded)
        );
    }
}
