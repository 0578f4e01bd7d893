//! The dynamic value space CEL expressions evaluate to.
//!
//! Lists and maps are `Rc`-backed so that cloning a `Value` — which the
//! evaluator does constantly, e.g. once per macro iteration to bind the
//! loop variable — is always O(1).

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::error::EvalError;

/// An ordered sequence of `(key, value)` pairs. Lookup is a linear scan
/// using [`Value`]'s structural equality rather than hashing keys, which
/// would need a bespoke `Hash` impl reconciling int/uint/double key
/// equality (see DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: Vec<(Value, Value)>,
}

impl ValueMap {
    pub fn new() -> Self {
        ValueMap {
            entries: Vec::new(),
        }
    }

    /// Insert a key/value pair. Last write wins on a duplicate key (see
    /// DESIGN.md for why).
    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

/// The dynamic value of an evaluated CEL expression.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    List(Rc<Vec<Value>>),
    Map(Rc<ValueMap>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(Rc::from(s.into()))
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(Rc::from(b.into()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn map(map: ValueMap) -> Value {
        Value::Map(Rc::new(map))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::WrongType {
                context: "expected bool".into(),
                got: other.type_name(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&Rc<Vec<Value>>, EvalError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(EvalError::WrongType {
                context: "expected list".into(),
                got: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::WrongType {
                context: "expected string".into(),
                got: other.type_name(),
            }),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Double(_))
    }

    /// `size(x)`. Code units are Unicode scalar values (`char` count), not
    /// bytes — see DESIGN.md.
    pub fn size(&self) -> Result<i64, EvalError> {
        let n = match self {
            Value::String(s) => s.chars().count(),
            Value::Bytes(b) => b.len(),
            Value::List(items) => items.len(),
            Value::Map(m) => m.len(),
            other => {
                return Err(EvalError::WrongType {
                    context: "size()".into(),
                    got: other.type_name(),
                })
            }
        };
        Ok(n as i64)
    }

    /// Canonical text form used by `string(x)` and by `+` when one side of
    /// a concatenation is a string.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Double(d) => d.to_string(),
            Value::String(s) => s.to_string(),
            Value::Bytes(b) => {
                let mut out = String::from("\"");
                for byte in b.iter() {
                    if byte.is_ascii_graphic() || *byte == b' ' {
                        out.push(*byte as char);
                    } else {
                        out.push_str(&format!("\\x{byte:02x}"));
                    }
                }
                out.push('"');
                out
            }
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::debug_form).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(m) => {
                let inner: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.debug_form(), v.debug_form()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }

    /// Like `stringify`, but quotes strings — used for list/map elements
    /// so `[1, "a"].string()` reads like a literal rather than `[1, a]`.
    fn debug_form(&self) -> String {
        match self {
            Value::String(s) => format!("{:?}", s.as_ref()),
            other => other.stringify(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stringify())
    }
}

fn int_eq_double(i: i64, d: f64) -> bool {
    d.fract() == 0.0 && d >= i64::MIN as f64 && d <= i64::MAX as f64 && (d as i64) == i
}

fn uint_eq_double(u: u64, d: f64) -> bool {
    d.fract() == 0.0 && d >= 0.0 && d <= u64::MAX as f64 && (d as u64) == u
}

fn int_eq_uint(i: i64, u: u64) -> bool {
    i >= 0 && (i as u64) == u
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Uint(a), Uint(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Int(a), Uint(b)) | (Uint(b), Int(a)) => int_eq_uint(*a, *b),
            (Int(a), Double(b)) | (Double(b), Int(a)) => int_eq_double(*a, *b),
            (Uint(a), Double(b)) | (Double(b), Uint(a)) => uint_eq_double(*a, *b),
            (List(a), List(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y),
            (Map(a), Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|bv| bv == v).unwrap_or(false))
            }
            _ => false,
        }
    }
}

/// Ordering: numeric pairs, string pairs, bool pairs (`false < true`), and
/// element-wise lexicographic list pairs are ordered; anything else
/// errors.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    use Value::*;
    match (a, b) {
        (Bool(x), Bool(y)) => Ok(x.cmp(y)),
        (String(x), String(y)) => Ok(x.as_ref().cmp(y.as_ref())),
        (Int(x), Int(y)) => Ok(x.cmp(y)),
        (Uint(x), Uint(y)) => Ok(x.cmp(y)),
        (Double(x), Double(y)) => x.partial_cmp(y).ok_or(EvalError::Incomparable("double", "double")),
        (Int(x), Uint(y)) => Ok(promote_int(*x).cmp(&(*y as i128))),
        (Uint(x), Int(y)) => Ok((*x as i128).cmp(&promote_int(*y))),
        (Int(x), Double(y)) => (*x as f64).partial_cmp(y).ok_or(EvalError::Incomparable("int", "double")),
        (Double(x), Int(y)) => x.partial_cmp(&(*y as f64)).ok_or(EvalError::Incomparable("double", "int")),
        (Uint(x), Double(y)) => (*x as f64).partial_cmp(y).ok_or(EvalError::Incomparable("uint", "double")),
        (Double(x), Uint(y)) => x.partial_cmp(&(*y as f64)).ok_or(EvalError::Incomparable("double", "uint")),
        (List(x), List(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                match compare(xi, yi)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => Err(EvalError::Incomparable(a.type_name(), b.type_name())),
    }
}

fn promote_int(i: i64) -> i128 {
    i as i128
}
