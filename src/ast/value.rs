use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::Column;

/// Numeric literal used by arithmetic deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return Some(Number::Int(n));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Some(Number::Float(f)),
            _ => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::Int(n as i64)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}

/// Arithmetic applied to the addressed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaOp {
    Inc,
    Dec,
    Times,
    Div,
    Power,
}

impl DeltaOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            DeltaOp::Inc => "+",
            DeltaOp::Dec => "-",
            DeltaOp::Times => "*",
            DeltaOp::Div => "/",
            DeltaOp::Power => "^",
        }
    }

    pub fn from_token(name: &str) -> Option<Self> {
        match name {
            "INC" => Some(DeltaOp::Inc),
            "DEC" => Some(DeltaOp::Dec),
            "TIMES" => Some(DeltaOp::Times),
            "DIV" => Some(DeltaOp::Div),
            "POWER" => Some(DeltaOp::Power),
            _ => None,
        }
    }
}

/// Write-time transform of a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteExpr {
    /// Reference to a column expression (`{DB_COL}`, `{DB_SUM}`, …).
    Column(Column),
    /// `{DB_FNC}` raw SQL, unescaped.
    Raw(String),
    Now,
    Time,
    /// `<column> <op> <n>`.
    Delta(DeltaOp, Number),
}

/// A value expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Plain text; never inspected for tokens.
    Text(String),
    /// Array or object, JSON-encoded before quoting.
    Json(serde_json::Value),
    Expr(Box<WriteExpr>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Value::Expr(Box::new(WriteExpr::Raw(sql.into())))
    }

    pub fn column(column: impl Into<Column>) -> Self {
        Value::Expr(Box::new(WriteExpr::Column(column.into())))
    }

    pub fn now() -> Self {
        Value::Expr(Box::new(WriteExpr::Now))
    }

    pub fn time() -> Self {
        Value::Expr(Box::new(WriteExpr::Time))
    }

    pub fn delta(op: DeltaOp, n: impl Into<Number>) -> Self {
        Value::Expr(Box::new(WriteExpr::Delta(op, n.into())))
    }

    pub fn inc(n: impl Into<Number>) -> Self {
        Value::delta(DeltaOp::Inc, n)
    }

    pub fn dec(n: impl Into<Number>) -> Self {
        Value::delta(DeltaOp::Dec, n)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Text(v.to_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Token strings are parsed; use [`Value::text`] for verbatim text.
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        crate::parser::parse_value(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        crate::parser::parse_value(&v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        crate::parser::value_from_json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
