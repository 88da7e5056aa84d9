//! Cell values of the inventory table
//!
//! Inventory columns are only known once a catalog is loaded, so cells are
//! dynamically typed. A [`Value`] is one scalar; a [`Cell`] is either a scalar
//! or, for iterable columns, a small ordered set of scalars.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single scalar cell value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays and objects are not scalars.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::Int(i)),
                None => n.as_f64().map(Value::Float),
            },
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Element text inside a bracketed collection literal
    fn literal(&self) -> String {
        match self {
            Value::Str(s) => {
                let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
                let mut out = String::with_capacity(s.len() + 2);
                out.push(quote);
                for c in s.chars() {
                    match c {
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        _ if c == '\\' || c == quote => {
                            out.push('\\');
                            out.push(c);
                        }
                        _ => out.push(c),
                    }
                }
                out.push(quote);
                out
            }
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            // Debug keeps the fractional part, so 1.0 does not read back as 1
            Value::Float(x) => format!("{:?}", x),
            Value::Int(i) => i.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "nan"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// One inventory cell: a scalar, or a small ordered set for iterable columns
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Scalar(Value),
    Set(Vec<Value>),
}

impl Cell {
    pub fn null() -> Self {
        Cell::Scalar(Value::Null)
    }

    /// Build a set cell, dropping repeated elements (first occurrence wins)
    pub fn set<I: IntoIterator<Item = Value>>(values: I) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for v in values {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        Cell::Set(out)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Scalar(Value::Null))
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Cell::Scalar(v) => Some(v),
            Cell::Set(_) => None,
        }
    }

    /// The scalar elements of this cell; a null scalar contributes nothing
    pub fn elements(&self) -> &[Value] {
        match self {
            Cell::Scalar(Value::Null) => &[],
            Cell::Scalar(v) => std::slice::from_ref(v),
            Cell::Set(values) => values,
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Cell::set),
            other => Value::from_json(other).map(Cell::Scalar),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Scalar(v) => v.to_json(),
            Cell::Set(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Scalar(v) => write!(f, "{}", v),
            Cell::Set(values) => {
                let items: Vec<String> = values.iter().map(Value::literal).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        Cell::Scalar(v)
    }
}

macro_rules! scalar_cell_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Cell {
                fn from(v: $t) -> Self {
                    Cell::Scalar(Value::from(v))
                }
            }
        )*
    };
}

scalar_cell_from!(&str, String, i64, i32, f64, bool);

/// Parse a serialized collection literal such as `['a', 'b']`, `('a',)` or
/// `{'a', 'b'}` into its elements.
///
/// Returns `None` when the text is not a bracketed collection of scalars.
pub fn parse_iterable_literal(text: &str) -> Option<Vec<Value>> {
    let text = text.trim();
    if text.is_empty() || text == "set()" {
        return Some(Vec::new());
    }

    let mut chars = text.chars();
    let open = chars.next()?;
    let close = chars.next_back()?;
    let matched = matches!((open, close), ('[', ']') | ('(', ')') | ('{', '}'));
    if !matched {
        return None;
    }

    let inner = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
    let inner = inner.strip_suffix(',').unwrap_or(inner);
    let normalized = format!("[{}]", literal_to_json(inner));

    let decoded: Vec<serde_json::Value> = serde_json::from_str(&normalized).ok()?;
    decoded.iter().map(Value::from_json).collect()
}

/// Rewrite the body of a Python-style literal as JSON: single-quoted strings
/// become double-quoted, and bare `None`/`True`/`False` become JSON keywords.
fn literal_to_json(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => match c {
                '\\' => match chars.next() {
                    Some('\'') => out.push('\''),
                    Some('"') => out.push_str("\\\""),
                    Some(next @ ('\\' | 'n' | 't' | 'r')) => {
                        out.push('\\');
                        out.push(next);
                    }
                    // Unknown escapes keep their backslash
                    Some(next) => {
                        out.push_str("\\\\");
                        out.push(next);
                    }
                    None => out.push_str("\\\\"),
                },
                '"' if q == '\'' => out.push_str("\\\""),
                _ if c == q => {
                    out.push('"');
                    quote = None;
                }
                _ => out.push(c),
            },
            None if c == '\'' || c == '"' => {
                out.push('"');
                quote = Some(c);
            }
            None if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !next.is_ascii_alphanumeric() && next != '_' {
                        break;
                    }
                    word.push(next);
                    _ = chars.next();
                }
                match word.as_str() {
                    "None" => out.push_str("null"),
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    _ => out.push_str(&word),
                }
            }
            None => out.push(c),
        }
    }
    out
}
