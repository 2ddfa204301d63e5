//! Token DSL parser.
//!
//! Turns the `{DB_<NAME>}` prefix strings used by existing call sites into
//! the typed AST. This is the only place the literal token spellings live.
//!
//! # Token overview
//!
//! ```text
//! {DB_SUM}amount        column transform     SUM(`amount`)
//! {DB_GE}18             condition operator   >= 18
//! {DB_INC}5             write-time delta     `counter` + 5
//! {DB_OR}  {DB_LB}      condition control    OR  (
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, space0},
    combinator::{all_consuming, map, map_res},
    sequence::{delimited, separated_pair, tuple},
    IResult,
};
use serde_json::Value as Json;

use crate::ast::*;
use crate::error::{DbError, DbResult};

/// Parse one `{DB_<NAME>}` token, returning the name.
fn token(input: &str) -> IResult<&str, &str> {
    delimited(
        tag("{DB_"),
        take_while1(|c: char| c.is_ascii_uppercase() || c == '_'),
        char('}'),
    )(input)
}

/// Split a leading token off `input` as `(name, remainder)`.
pub fn split_token(input: &str) -> Option<(&str, &str)> {
    match token(input) {
        Ok((rest, name)) => Some((name, rest)),
        Err(_) => None,
    }
}

fn quoted_literal(spec: &str) -> Option<&str> {
    let s = spec.trim();
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && (first == '\'' || first == '"') => {
            Some(&s[1..s.len() - 1])
        }
        _ => None,
    }
}

/// Parse a column spec.
pub fn parse_column(spec: &str) -> Column {
    if let Some(inner) = quoted_literal(spec) {
        return Column::Literal(inner.to_string());
    }
    match split_token(spec) {
        Some(("FNC", rest)) => Column::Raw(rest.to_string()),
        Some(("VAL", rest)) => Column::Value(rest.to_string()),
        Some((name, rest)) => match ColumnFn::from_token(name) {
            Some(f) => Column::Func(f, Box::new(parse_column(rest))),
            None => Column::Unknown(name.to_string()),
        },
        None => Column::Ident(spec.to_string()),
    }
}

/// Parse a write value. Strings without a write token stay plain text.
pub fn parse_value(spec: &str) -> Value {
    let Some((name, rest)) = split_token(spec) else {
        return Value::Text(spec.to_string());
    };
    match name {
        "COL" => Value::column(parse_column(rest)),
        "FNC" => Value::raw(rest),
        "NOW" => Value::now(),
        "TIME" => Value::time(),
        "YEAR" | "MONTH" | "DAY" | "COUNT" | "SUM" => Value::column(parse_column(spec)),
        _ => match DeltaOp::from_token(name) {
            Some(op) => match Number::parse(rest) {
                Some(n) => Value::delta(op, n),
                None => Value::Text(spec.to_string()),
            },
            None => Value::Text(spec.to_string()),
        },
    }
}

fn operand(rest: &str) -> Value {
    match Number::parse(rest) {
        Some(Number::Int(n)) => Value::Int(n),
        Some(Number::Float(f)) => Value::Float(f),
        None => parse_value(rest),
    }
}

fn comparator(name: &str, operand: Value) -> Option<Test> {
    let test = match name {
        "NE" => Test::Ne(operand),
        "GE" => Test::Ge(operand),
        "GT" => Test::Gt(operand),
        "LE" => Test::Le(operand),
        "LT" => Test::Lt(operand),
        "NNE" => Test::NullSafeEq(operand),
        "LIKE" => Test::Like(operand),
        "XLIKE" => Test::NotLike(operand),
        "INULL" => Test::IsNull,
        "XINULL" => Test::IsNotNull,
        _ => return None,
    };
    Some(test)
}

/// Parse a condition value: a comparator token selects the operator,
/// anything else is an equality test.
pub fn parse_test(spec: &str) -> Test {
    if let Some((name, rest)) = split_token(spec) {
        if let Some(test) = comparator(name, operand(rest)) {
            return test;
        }
    }
    Test::Eq(parse_value(spec))
}

/// Equality test for an already-typed value; text is inspected for comparator tokens.
pub fn test_from_value(value: Value) -> Test {
    match value {
        Value::Text(s) => parse_test(&s),
        other => Test::Eq(other),
    }
}

/// Recognise a condition control marker.
pub fn parse_marker(spec: &str) -> Option<Logic> {
    let (name, rest) = split_token(spec.trim())?;
    if !rest.is_empty() {
        return None;
    }
    match name {
        "AND" => Some(Logic::And),
        "OR" => Some(Logic::Or),
        "XOR" => Some(Logic::Xor),
        "LB" => Some(Logic::Open),
        "RB" => Some(Logic::Close),
        _ => None,
    }
}

/// Parse a single-key order spec: `RAND`, `{DB_RAND}`, `col` or `col DESC`.
pub fn parse_order(spec: &str) -> Order {
    let s = spec.trim();
    if s.eq_ignore_ascii_case("RAND") || s == "{DB_RAND}" {
        return Order::Random;
    }
    if s.is_empty() {
        return Order::default();
    }
    match s.rsplit_once(char::is_whitespace) {
        Some((col, dir)) if dir.eq_ignore_ascii_case("desc") || dir.eq_ignore_ascii_case("asc") => {
            Order::default().then(parse_column(col.trim_end()), Direction::parse(dir))
        }
        _ => Order::asc(parse_column(s)),
    }
}

fn limit_number(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse::<u64>)(input)
}

/// Parse `"10"` or `"5, 10"` (offset, count).
pub fn parse_limit(spec: &str) -> DbResult<Limit> {
    let result: IResult<&str, Limit> = all_consuming(alt((
        map(
            separated_pair(limit_number, tuple((space0, char(','), space0)), limit_number),
            |(offset, count)| Limit::Range(offset, count),
        ),
        map(limit_number, Limit::Count),
    )))(spec.trim());
    match result {
        Ok((_, limit)) => Ok(limit),
        Err(_) => Err(DbError::InvalidLimit(format!("'{}'", spec))),
    }
}

// ---------------------------------------------------------------------------
// JSON forms
// ---------------------------------------------------------------------------

/// Convert a JSON scalar or structure into a value.
pub fn value_from_json(v: Json) -> Value {
    match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Text(u.to_string())
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => parse_value(&s),
        other => Value::Json(other),
    }
}

/// Column list: a spec string, an array (positional) or an object (alias → spec).
pub fn columns_from_json(v: &Json) -> DbResult<Columns> {
    match v {
        Json::Null => Ok(Columns::new()),
        Json::String(s) => Ok(Columns::from(s.as_str())),
        Json::Array(items) => items.iter().try_fold(Columns::new(), |cols, item| {
            let spec = item
                .as_str()
                .ok_or_else(|| DbError::invalid(format!("column spec must be a string: {}", item)))?;
            Ok(cols.col(spec))
        }),
        Json::Object(map) => map.iter().try_fold(Columns::new(), |cols, (key, item)| {
            let spec = item
                .as_str()
                .ok_or_else(|| DbError::invalid(format!("column spec must be a string: {}", item)))?;
            if key.parse::<u64>().is_ok() {
                Ok(cols.col(spec))
            } else {
                Ok(cols.aliased(key.as_str(), spec))
            }
        }),
        other => Err(DbError::invalid(format!("invalid column list: {}", other))),
    }
}

fn directive_name(key: &str) -> String {
    let key = key.trim();
    let name = key
        .strip_prefix("{DB_")
        .and_then(|k| k.strip_suffix('}'))
        .unwrap_or(key);
    name.to_ascii_uppercase()
}

fn list_values(v: &Json) -> Vec<Value> {
    match v {
        Json::Array(items) => items.iter().cloned().map(value_from_json).collect(),
        other => vec![value_from_json(other.clone())],
    }
}

/// Condition value in JSON form.
pub fn test_from_json(v: &Json) -> Test {
    match v {
        Json::String(s) => parse_test(s),
        Json::Object(map) if map.len() == 1 => match map.iter().next() {
            Some((key, inner)) => directive(key, inner)
                .unwrap_or_else(|| Test::Eq(Value::Json(v.clone()))),
            None => Test::Eq(Value::Json(v.clone())),
        },
        other => Test::Eq(value_from_json(other.clone())),
    }
}

/// `{"IN": [..]}`, `{"GE": 18}`, … ; `None` when the key is not a directive.
fn directive(key: &str, inner: &Json) -> Option<Test> {
    let name = directive_name(key);
    match name.as_str() {
        "IN" | "LIST" => Some(Test::In(list_values(inner))),
        "XIN" | "XLIST" => Some(Test::NotIn(list_values(inner))),
        "BETWEEN" => Some(Test::Between(list_values(inner))),
        "XBETWEEN" => Some(Test::NotBetween(list_values(inner))),
        _ => comparator(&name, value_from_json(inner.clone())),
    }
}

fn push_entry(cond: Condition, key: &str, v: &Json) -> Condition {
    if let Some(logic) = v.as_str().and_then(parse_marker) {
        return cond.push(Clause::Logic(logic));
    }
    cond.test(parse_column(key), test_from_json(v))
}

/// Condition mapping: an object, or an array of objects and marker strings.
///
/// A bare JSON string is rejected: raw fragments go through [`Condition::raw`].
pub fn condition_from_json(v: &Json) -> DbResult<Condition> {
    match v {
        Json::Null => Ok(Condition::new()),
        Json::Object(map) => Ok(map
            .iter()
            .fold(Condition::new(), |cond, (k, item)| push_entry(cond, k, item))),
        Json::Array(items) => items.iter().try_fold(Condition::new(), |cond, item| match item {
            Json::String(s) => match parse_marker(s) {
                Some(logic) => Ok(cond.push(Clause::Logic(logic))),
                None => Err(DbError::invalid(format!(
                    "expected a condition marker, got '{}'",
                    s
                ))),
            },
            Json::Object(map) => Ok(map
                .iter()
                .fold(cond, |cond, (k, item)| push_entry(cond, k, item))),
            other => Err(DbError::invalid(format!("invalid condition entry: {}", other))),
        }),
        Json::String(_) => Err(DbError::invalid(
            "raw string conditions must be built with Condition::raw",
        )),
        other => Err(DbError::invalid(format!("invalid condition: {}", other))),
    }
}

/// Order: `"RAND"`, `"col"`, `{"col": "desc"}`, or an array of those / `[col, dir]` pairs.
pub fn order_from_json(v: &Json) -> DbResult<Order> {
    match v {
        Json::Null => Ok(Order::default()),
        Json::String(s) => Ok(parse_order(s)),
        Json::Object(map) => Ok(map.iter().fold(Order::default(), |order, (col, dir)| {
            order.then(parse_column(col), Direction::parse(dir.as_str().unwrap_or("asc")))
        })),
        Json::Array(items) => items.iter().try_fold(Order::default(), |order, item| match item {
            Json::String(s) => Ok(match parse_order(s) {
                Order::Random => Order::Random,
                Order::By(keys) => keys
                    .into_iter()
                    .fold(order, |order, (col, dir)| order.then(col, dir)),
            }),
            Json::Array(pair) if !pair.is_empty() => {
                let col = pair[0]
                    .as_str()
                    .ok_or_else(|| DbError::invalid(format!("invalid order key: {}", item)))?;
                let dir = pair.get(1).and_then(Json::as_str).unwrap_or("asc");
                Ok(order.then(parse_column(col), Direction::parse(dir)))
            }
            other => Err(DbError::invalid(format!("invalid order entry: {}", other))),
        }),
        other => Err(DbError::invalid(format!("invalid order: {}", other))),
    }
}

/// Group: one column spec or an array of them.
pub fn group_from_json(v: &Json) -> DbResult<Vec<Column>> {
    match v {
        Json::Null => Ok(Vec::new()),
        Json::String(s) => Ok(vec![parse_column(s)]),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(parse_column)
                    .ok_or_else(|| DbError::invalid(format!("invalid group key: {}", item)))
            })
            .collect(),
        other => Err(DbError::invalid(format!("invalid group: {}", other))),
    }
}

/// Limit: `10`, `"5,10"`, `[10]` or `[5, 10]`.
pub fn limit_from_json(v: &Json) -> DbResult<Option<Limit>> {
    let bad = || DbError::InvalidLimit(v.to_string());
    match v {
        Json::Null => Ok(None),
        Json::Number(n) => n.as_u64().map(|n| Some(Limit::Count(n))).ok_or_else(bad),
        Json::String(s) => parse_limit(s).map(Some),
        Json::Array(items) => {
            let nums: Option<Vec<u64>> = items.iter().map(Json::as_u64).collect();
            match nums.as_deref() {
                Some([count]) => Ok(Some(Limit::Count(*count))),
                Some([offset, count]) => Ok(Some(Limit::Range(*offset, *count))),
                _ => Err(bad()),
            }
        }
        _ => Err(bad()),
    }
}
