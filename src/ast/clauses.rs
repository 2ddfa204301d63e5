use serde::{Deserialize, Serialize};

use crate::ast::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// `desc` in any case is descending; anything else is ascending.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// ORDER BY specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Order {
    By(Vec<(Column, Direction)>),
    /// `ORDER BY RAND()`
    Random,
}

impl Default for Order {
    fn default() -> Self {
        Order::By(Vec::new())
    }
}

impl Order {
    pub fn asc(column: impl Into<Column>) -> Self {
        Order::default().then(column, Direction::Asc)
    }

    pub fn desc(column: impl Into<Column>) -> Self {
        Order::default().then(column, Direction::Desc)
    }

    pub fn random() -> Self {
        Order::Random
    }

    /// Append a key; a random order is replaced.
    pub fn then(self, column: impl Into<Column>, direction: Direction) -> Self {
        let mut keys = match self {
            Order::By(keys) => keys,
            Order::Random => Vec::new(),
        };
        keys.push((column.into(), direction));
        Order::By(keys)
    }

    pub fn then_asc(self, column: impl Into<Column>) -> Self {
        self.then(column, Direction::Asc)
    }

    pub fn then_desc(self, column: impl Into<Column>) -> Self {
        self.then(column, Direction::Desc)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Order::By(keys) if keys.is_empty())
    }
}

impl From<&str> for Order {
    fn from(spec: &str) -> Self {
        crate::parser::parse_order(spec)
    }
}

/// LIMIT specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    Count(u64),
    /// `(offset, count)`
    Range(u64, u64),
}

impl From<u64> for Limit {
    fn from(n: u64) -> Self {
        Limit::Count(n)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Range(offset, count)
    }
}

/// Row locking clause for exactly one SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    ForUpdate,
    Share,
}

impl LockMode {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LockMode::ForUpdate => " FOR UPDATE",
            LockMode::Share => " LOCK IN SHARE MODE",
        }
    }
}

/// Mode for `LOCK TABLES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableLock {
    Read,
    Write,
}

impl TableLock {
    pub fn as_sql(&self) -> &'static str {
        match self {
            TableLock::Read => "READ",
            TableLock::Write => "WRITE",
        }
    }
}
