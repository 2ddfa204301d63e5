use serde::{Deserialize, Serialize};

use crate::ast::{Column, Value};

/// Boolean control markers (`{DB_AND}`, `{DB_OR}`, `{DB_XOR}`, `{DB_LB}`, `{DB_RB}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logic {
    And,
    Or,
    Xor,
    Open,
    Close,
}

impl Logic {
    pub fn token(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
            Logic::Xor => "XOR",
            Logic::Open => "LB",
            Logic::Close => "RB",
        }
    }
}

/// The comparison applied to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Test {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Ge(Value),
    Lt(Value),
    Le(Value),
    /// `<=>`
    NullSafeEq(Value),
    Like(Value),
    NotLike(Value),
    IsNull,
    IsNotNull,
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Exactly two bounds are expected; any other arity is a malformed clause.
    Between(Vec<Value>),
    NotBetween(Vec<Value>),
}

impl Test {
    /// Comparator for the single-operand shapes.
    pub fn operator(&self) -> Option<&'static str> {
        match self {
            Test::Eq(_) => Some("="),
            Test::Ne(_) => Some("!="),
            Test::Gt(_) => Some(">"),
            Test::Ge(_) => Some(">="),
            Test::Lt(_) => Some("<"),
            Test::Le(_) => Some("<="),
            Test::NullSafeEq(_) => Some("<=>"),
            Test::Like(_) => Some("LIKE"),
            Test::NotLike(_) => Some("NOT LIKE"),
            Test::IsNull => Some("IS NULL"),
            Test::IsNotNull => Some("IS NOT NULL"),
            _ => None,
        }
    }
}

/// One entry of a condition sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    Logic(Logic),
    Test { column: Column, test: Test },
    /// Pre-formatted fragment, emitted verbatim.
    Raw(String),
}

/// Ordered clause list joined by an implicit AND.
///
/// ```
/// use dynsql::ast::Condition;
///
/// let cond = Condition::new()
///     .eq("status", 1)
///     .open()
///     .ge("age", 18)
///     .or()
///     .is_null("guardian")
///     .close();
/// assert_eq!(cond.len(), 6);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub clauses: Vec<Clause>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A raw SQL fragment. Nothing is escaped; never pass untrusted input.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new().push(Clause::Raw(sql.into()))
    }

    pub fn push(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn test(self, column: impl Into<Column>, test: Test) -> Self {
        self.push(Clause::Test {
            column: column.into(),
            test,
        })
    }

    /// `col = value`, where token strings select an operator (`"{DB_GE}18"`).
    pub fn entry(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, crate::parser::test_from_value(value.into()))
    }

    pub fn eq(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, Test::Eq(value.into()))
    }

    pub fn ne(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, Test::Ne(value.into()))
    }

    pub fn gt(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, Test::Gt(value.into()))
    }

    pub fn ge(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, Test::Ge(value.into()))
    }

    pub fn lt(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, Test::Lt(value.into()))
    }

    pub fn le(self, column: impl Into<Column>, value: impl Into<Value>) -> Self {
        self.test(column, Test::Le(value.into()))
    }

    pub fn like(self, column: impl Into<Column>, pattern: impl Into<String>) -> Self {
        self.test(column, Test::Like(Value::Text(pattern.into())))
    }

    pub fn not_like(self, column: impl Into<Column>, pattern: impl Into<String>) -> Self {
        self.test(column, Test::NotLike(Value::Text(pattern.into())))
    }

    pub fn is_null(self, column: impl Into<Column>) -> Self {
        self.test(column, Test::IsNull)
    }

    pub fn is_not_null(self, column: impl Into<Column>) -> Self {
        self.test(column, Test::IsNotNull)
    }

    pub fn is_in<V: Into<Value>>(
        self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.test(column, Test::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<V: Into<Value>>(
        self,
        column: impl Into<Column>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.test(
            column,
            Test::NotIn(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn between(
        self,
        column: impl Into<Column>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.test(column, Test::Between(vec![low.into(), high.into()]))
    }

    pub fn not_between(
        self,
        column: impl Into<Column>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.test(column, Test::NotBetween(vec![low.into(), high.into()]))
    }

    pub fn and(self) -> Self {
        self.push(Clause::Logic(Logic::And))
    }

    pub fn or(self) -> Self {
        self.push(Clause::Logic(Logic::Or))
    }

    pub fn xor(self) -> Self {
        self.push(Clause::Logic(Logic::Xor))
    }

    pub fn open(self) -> Self {
        self.push(Clause::Logic(Logic::Open))
    }

    pub fn close(self) -> Self {
        self.push(Clause::Logic(Logic::Close))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }
}
