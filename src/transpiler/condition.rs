use std::sync::OnceLock;

use regex::Regex;

use crate::ast::{Clause, Column, Condition, Logic, Test, Value};
use crate::error::{DbError, DbResult};
use crate::transpiler::Compiler;

/// Loose shape check for raw fragments: an operand followed by a comparator.
fn raw_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(
            r#"(?is)^\s*\(*\s*(NOT\s+)?(EXISTS\b|[\w`".']+(\([^)]*\))?\s*(<=>|!=|<>|>=|<=|=|>|<|(NOT\s+)?(LIKE|IN|BETWEEN|IS|REGEXP|RLIKE)\b))"#,
        )
        .expect("raw condition pattern is valid")
    })
}

impl Compiler {
    /// `" WHERE …"`, or an empty string for an empty condition.
    pub fn condition(&self, condition: &Condition) -> DbResult<String> {
        self.prefixed(" WHERE ", condition)
    }

    /// `" HAVING …"`, or an empty string for an empty condition.
    pub fn having(&self, condition: &Condition) -> DbResult<String> {
        self.prefixed(" HAVING ", condition)
    }

    fn prefixed(&self, keyword: &str, condition: &Condition) -> DbResult<String> {
        let body = self.condition_body(condition)?;
        if body.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}{}", keyword, body))
    }

    /// Join clauses with the pending operator (AND by default).
    ///
    /// Groups that end up empty are removed together with their joiner, and
    /// unclosed groups are closed at the end, so the output is always
    /// balanced and never ends on an operator.
    pub fn condition_body(&self, condition: &Condition) -> DbResult<String> {
        let mut out = String::new();
        let mut joiner: Option<&'static str> = None;
        // Start offset of every open group (including its joiner) and the
        // joiner that was pending when it opened.
        let mut groups: Vec<(usize, Option<&'static str>)> = Vec::new();

        for clause in &condition.clauses {
            match clause {
                Clause::Logic(Logic::And) => joiner = Some("AND"),
                Clause::Logic(Logic::Or) => joiner = Some("OR"),
                Clause::Logic(Logic::Xor) => joiner = Some("XOR"),
                Clause::Logic(Logic::Open) => {
                    groups.push((out.len(), joiner));
                    join(&mut out, joiner.take());
                    out.push('(');
                }
                Clause::Logic(Logic::Close) => {
                    joiner = match groups.pop() {
                        Some((start, pending)) => {
                            // An empty group leaves the joiner before it pending.
                            if close_group(&mut out, start) { pending } else { None }
                        }
                        None => None,
                    };
                }
                Clause::Test { column, test } => {
                    let fragment = self.test(column, test)?;
                    if !fragment.is_empty() {
                        join(&mut out, joiner.take());
                        out.push_str(&fragment);
                    }
                }
                Clause::Raw(sql) => {
                    let fragment = self.raw(sql)?;
                    if !fragment.is_empty() {
                        join(&mut out, joiner.take());
                        out.push_str(&fragment);
                    }
                }
            }
        }
        while let Some((start, _)) = groups.pop() {
            close_group(&mut out, start);
        }
        Ok(out)
    }

    fn raw(&self, sql: &str) -> DbResult<String> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Ok(String::new());
        }
        if !raw_shape().is_match(sql) {
            if self.is_strict() {
                return Err(DbError::invalid(format!(
                    "raw condition failed the shape check: {}",
                    sql
                )));
            }
            tracing::warn!(fragment = sql, "raw condition failed the shape check");
        }
        Ok(sql.to_string())
    }

    /// Compile one `column <test>` clause.
    pub fn test(&self, column: &Column, test: &Test) -> DbResult<String> {
        let col = self.column(column)?;
        if col.is_empty() {
            return Ok(String::new());
        }
        match test {
            Test::IsNull | Test::IsNotNull => {
                Ok(format!("{} {}", col, test.operator().unwrap_or_default()))
            }
            Test::In(values) if values.is_empty() => Ok(format!("{} IN (NULL)", col)),
            Test::In(values) => Ok(format!("{} IN ({})", col, self.list(values)?)),
            Test::NotIn(values) if values.is_empty() => Ok(String::new()),
            Test::NotIn(values) => Ok(format!("{} NOT IN ({})", col, self.list(values)?)),
            Test::Between(bounds) => self.between(&col, column, "BETWEEN", bounds),
            Test::NotBetween(bounds) => self.between(&col, column, "NOT BETWEEN", bounds),
            Test::Eq(v)
            | Test::Ne(v)
            | Test::Gt(v)
            | Test::Ge(v)
            | Test::Lt(v)
            | Test::Le(v)
            | Test::NullSafeEq(v)
            | Test::Like(v)
            | Test::NotLike(v) => {
                let op = test.operator().unwrap_or("=");
                let value = self.value(&comparison_operand(v), Some(column))?;
                Ok(format!("{} {} {}", col, op, value))
            }
        }
    }

    fn between(&self, col: &str, column: &Column, op: &str, bounds: &[Value]) -> DbResult<String> {
        let [low, high] = bounds else {
            return self.drop_fragment(DbError::invalid(format!(
                "{} on {} expects two bounds, got {}",
                op,
                col,
                bounds.len()
            )));
        };
        Ok(format!(
            "{} {} {} AND {}",
            col,
            op,
            self.value(&comparison_operand(low), Some(column))?,
            self.value(&comparison_operand(high), Some(column))?
        ))
    }

    fn list(&self, values: &[Value]) -> DbResult<String> {
        let members = values
            .iter()
            .map(|v| self.list_member(v))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(members.join(","))
    }

    /// IN-list members are quoted whatever their type.
    fn list_member(&self, value: &Value) -> DbResult<String> {
        let dialect = self.dialect();
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(b) => Ok(dialect.quote_value(if *b { "1" } else { "0" })),
            Value::Int(n) => Ok(dialect.quote_value(&n.to_string())),
            Value::Float(f) => Ok(dialect.quote_value(&f.to_string())),
            Value::Text(s) => Ok(dialect.quote_value(s)),
            Value::Json(j) => Ok(dialect.quote_value(&serde_json::to_string(j)?)),
            Value::Expr(_) => self.value(value, None),
        }
    }
}

/// Booleans compare as the empty string.
fn comparison_operand(value: &Value) -> Value {
    match value {
        Value::Bool(_) => Value::Text(String::new()),
        other => other.clone(),
    }
}

fn join(out: &mut String, joiner: Option<&str>) {
    if !out.is_empty() && !out.ends_with('(') {
        out.push(' ');
        out.push_str(joiner.unwrap_or("AND"));
        out.push(' ');
    }
}

/// Close the group opened at `start`. Returns true when it was empty and
/// has been removed.
fn close_group(out: &mut String, start: usize) -> bool {
    if out.ends_with('(') {
        out.truncate(start);
        true
    } else {
        out.push(')');
        false
    }
}
