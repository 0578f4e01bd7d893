//! The function table contract and the standard library it defaults to.
//!
//! An embedder extends the evaluator not by subclassing anything but by
//! providing an object that intercepts the names it cares about and falls
//! back to [`StandardFunctions`] for everything else (see DESIGN.md).

use std::cmp::Ordering;
use std::rc::Rc;

use regex::Regex;

use crate::ast::is_macro_name;
use crate::error::EvalError;
use crate::value::{compare, Value};

/// Dispatch surface an [`crate::Evaluator`] calls into for every non-macro
/// `Call` node.
pub trait FunctionTable {
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError>;
    fn call_method(&self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError>;
}

/// CEL's built-in functions and methods.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFunctions;

impl FunctionTable for StandardFunctions {
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if is_macro_name(name) {
            return Err(EvalError::UnknownFunction(name.to_string()));
        }
        match name {
            "size" => one_arg(name, args).and_then(|v| v.size().map(Value::Int)),
            "int" => one_arg(name, args).and_then(to_int),
            "uint" => one_arg(name, args).and_then(to_uint),
            "double" => one_arg(name, args).and_then(to_double),
            "string" => one_arg(name, args).map(|v| Value::string(v.stringify())),
            "bool" => one_arg(name, args).map(to_bool),
            "type" => one_arg(name, args).map(|v| Value::string(v.type_name())),
            "has" => {
                let (m, k) = two_args(name, args)?;
                Ok(Value::Bool(match m {
                    Value::Map(map) => map.contains_key(k),
                    _ => false,
                }))
            }
            "matches" => {
                let (s, pat) = two_args(name, args)?;
                let s = s.as_str()?;
                let pat = pat.as_str()?;
                let re = Regex::new(pat).map_err(|_| EvalError::InvalidRegex(pat.to_string()))?;
                Ok(Value::Bool(re.is_match(s)))
            }
            "max" => fold_ordered(name, args, Ordering::Greater),
            "min" => fold_ordered(name, args, Ordering::Less),
            "timestamp" | "duration" => {
                // Placeholder: full date/time semantics are an explicit
                // non-goal. Trivial construction only — the value passes
                // through unchanged.
                one_arg(name, args).cloned()
            }
            _ => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }

    fn call_method(&self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if is_macro_name(name) {
            return Err(EvalError::UnknownMethod(name.to_string()));
        }
        match name {
            "size" => {
                no_args(name, args)?;
                receiver.size().map(Value::Int)
            }
            "contains" => match receiver {
                Value::String(s) => {
                    let (needle,) = one_arg_tuple(name, args)?;
                    Ok(Value::Bool(s.contains(needle.as_str()?)))
                }
                Value::List(items) => {
                    let (needle,) = one_arg_tuple(name, args)?;
                    Ok(Value::Bool(items.iter().any(|v| v == needle)))
                }
                other => Err(EvalError::WrongType {
                    context: "contains()".into(),
                    got: other.type_name(),
                }),
            },
            "startsWith" => {
                let s = receiver.as_str()?;
                let (pfx,) = one_arg_tuple(name, args)?;
                Ok(Value::Bool(s.starts_with(pfx.as_str()?)))
            }
            "endsWith" => {
                let s = receiver.as_str()?;
                let (sfx,) = one_arg_tuple(name, args)?;
                Ok(Value::Bool(s.ends_with(sfx.as_str()?)))
            }
            "toLowerCase" => {
                no_args(name, args)?;
                Ok(Value::string(receiver.as_str()?.to_lowercase()))
            }
            "toUpperCase" => {
                no_args(name, args)?;
                Ok(Value::string(receiver.as_str()?.to_uppercase()))
            }
            "trim" => {
                no_args(name, args)?;
                Ok(Value::string(receiver.as_str()?.trim()))
            }
            "replace" => {
                let s = receiver.as_str()?;
                let (from, to) = two_args(name, args)?;
                Ok(Value::string(s.replace(from.as_str()?, to.as_str()?)))
            }
            "split" => {
                let s = receiver.as_str()?;
                let (sep,) = one_arg_tuple(name, args)?;
                let parts = s
                    .split(sep.as_str()?)
                    .map(Value::string)
                    .collect::<Vec<_>>();
                Ok(Value::list(parts))
            }
            _ => Err(EvalError::UnknownMethod(name.to_string())),
        }
    }
}

fn one_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::WrongArity {
            name: name.to_string(),
            expected: "1".into(),
            got: args.len(),
        });
    }
    Ok(&args[0])
}

fn one_arg_tuple<'a>(name: &str, args: &'a [Value]) -> Result<(&'a Value,), EvalError> {
    one_arg(name, args).map(|v| (v,))
}

fn no_args(name: &str, args: &[Value]) -> Result<(), EvalError> {
    if !args.is_empty() {
        return Err(EvalError::WrongArity {
            name: name.to_string(),
            expected: "0".into(),
            got: args.len(),
        });
    }
    Ok(())
}

fn two_args<'a>(name: &str, args: &'a [Value]) -> Result<(&'a Value, &'a Value), EvalError> {
    if args.len() != 2 {
        return Err(EvalError::WrongArity {
            name: name.to_string(),
            expected: "2".into(),
            got: args.len(),
        });
    }
    Ok((&args[0], &args[1]))
}

fn to_int(v: &Value) -> Result<Value, EvalError> {
    match v {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Uint(u) => Ok(Value::Int(*u as i64)),
        Value::Double(d) => Ok(Value::Int(d.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| EvalError::InvalidConversion {
                from: "string",
                to: "int",
            }),
        other => Err(EvalError::InvalidConversion {
            from: other.type_name(),
            to: "int",
        }),
    }
}

fn to_uint(v: &Value) -> Result<Value, EvalError> {
    let as_int = to_int(v)?;
    match as_int {
        Value::Int(i) if i >= 0 => Ok(Value::Uint(i as u64)),
        Value::Int(_) => Err(EvalError::InvalidConversion {
            from: v.type_name(),
            to: "uint",
        }),
        _ => unreachable!("to_int always returns Value::Int"),
    }
}

fn to_double(v: &Value) -> Result<Value, EvalError> {
    match v {
        Value::Int(i) => Ok(Value::Double(*i as f64)),
        Value::Uint(u) => Ok(Value::Double(*u as f64)),
        Value::Double(d) => Ok(Value::Double(*d)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| EvalError::InvalidConversion {
                from: "string",
                to: "double",
            }),
        other => Err(EvalError::InvalidConversion {
            from: other.type_name(),
            to: "double",
        }),
    }
}

fn to_bool(v: &Value) -> Value {
    let b = match v {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Uint(u) => *u != 0,
        Value::Double(d) => *d != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::List(l) => !l.is_empty(),
        Value::Map(m) => !m.is_empty(),
        Value::Null => false,
    };
    Value::Bool(b)
}

/// Shared fold for `max`/`min`: accepts either a single list argument or a
/// variadic list of scalar arguments.
fn fold_ordered(name: &str, args: &[Value], want: Ordering) -> Result<Value, EvalError> {
    let items: Vec<Value> = match args {
        [Value::List(list)] => list.as_ref().clone(),
        _ => args.to_vec(),
    };
    let mut iter = items.into_iter();
    let mut best = iter.next().ok_or_else(|| EvalError::WrongArity {
        name: name.to_string(),
        expected: "at least 1".into(),
        got: 0,
    })?;
    for candidate in iter {
        if compare(&candidate, &best)? == want {
            best = candidate;
        }
    }
    Ok(best)
}

/// Wraps a closure-backed override map around [`StandardFunctions`], for
/// an embedder that wants to override specific global functions while
/// delegating everything else to the standard table.
pub struct DelegatingFunctions {
    overrides: Vec<(String, Rc<dyn Fn(&[Value]) -> Result<Value, EvalError>>)>,
    fallback: StandardFunctions,
}

impl DelegatingFunctions {
    pub fn new() -> Self {
        DelegatingFunctions {
            overrides: Vec::new(),
            fallback: StandardFunctions,
        }
    }

    /// Register (or replace) a global function override.
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        self.overrides.push((name.into(), Rc::new(f)));
        self
    }
}

impl Default for DelegatingFunctions {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionTable for DelegatingFunctions {
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        for (n, f) in &self.overrides {
            if n == name {
                return f(args);
            }
        }
        self.fallback.call(name, args)
    }

    fn call_method(&self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        self.fallback.call_method(receiver, name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_dispatches_for_every_sized_kind() {
        let f = StandardFunctions;
        assert_eq!(
            f.call("size", &[Value::string("hello")]).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            f.call("size", &[Value::list(vec![Value::Int(1), Value::Int(2)])])
                .unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn has_never_errors_on_non_map() {
        let f = StandardFunctions;
        assert_eq!(
            f.call("has", &[Value::Int(1), Value::string("k")]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn matches_checks_substring_pattern() {
        let f = StandardFunctions;
        assert_eq!(
            f.call(
                "matches",
                &[Value::string("test@example.com"), Value::string(".*@.*")]
            )
            .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn max_folds_variadic_args_and_list() {
        let f = StandardFunctions;
        assert_eq!(
            f.call("max", &[Value::Int(1), Value::Int(5), Value::Int(3)])
                .unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            f.call(
                "min",
                &[Value::list(vec![Value::Int(4), Value::Int(-2), Value::Int(9)])]
            )
            .unwrap(),
            Value::Int(-2)
        );
    }

    #[test]
    fn string_methods_dispatch_on_receiver() {
        let f = StandardFunctions;
        assert_eq!(
            f.call_method(&Value::string("Hello"), "toLowerCase", &[])
                .unwrap(),
            Value::string("hello")
        );
        assert_eq!(
            f.call_method(
                &Value::string("a,b,c"),
                "split",
                &[Value::string(",")]
            )
            .unwrap(),
            Value::list(vec![Value::string("a"), Value::string("b"), Value::string("c")])
        );
    }
}
