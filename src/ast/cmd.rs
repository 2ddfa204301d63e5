//! Statement builders.

use serde::{Deserialize, Serialize};

use crate::ast::{Column, Columns, Condition, Limit, LockMode, Order, Value};

/// SELECT description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub table: String,
    pub columns: Columns,
    pub condition: Condition,
    pub order: Order,
    pub limit: Option<Limit>,
    pub group: Vec<Column>,
    pub having: Condition,
    pub lock: Option<LockMode>,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn columns(mut self, columns: impl Into<Columns>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn column(mut self, column: impl Into<Column>) -> Self {
        self.columns = self.columns.col(column);
        self
    }

    pub fn column_as(mut self, alias: impl Into<String>, column: impl Into<Column>) -> Self {
        self.columns = self.columns.aliased(alias, column);
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn order_by(mut self, order: impl Into<Order>) -> Self {
        self.order = order.into();
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn limit_spec(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn range(mut self, offset: u64, count: u64) -> Self {
        self.limit = Some(Limit::Range(offset, count));
        self
    }

    pub fn group_by(mut self, column: impl Into<Column>) -> Self {
        self.group.push(column.into());
        self
    }

    pub fn having(mut self, condition: Condition) -> Self {
        self.having = condition;
        self
    }

    pub fn lock(mut self, mode: LockMode) -> Self {
        self.lock = Some(mode);
        self
    }
}

/// Ordered column assignments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Data(pub Vec<(String, Value)>);

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Data(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Single-row INSERT … SET.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: String,
    pub data: Data,
    pub ignore: bool,
    pub upsert: bool,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data = self.data.set(column, value);
        self
    }

    pub fn data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Append `ON DUPLICATE KEY UPDATE` for every column.
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }
}

/// Multi-row INSERT … VALUES.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkInsert {
    pub table: String,
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub ignore: bool,
    pub upsert: bool,
}

impl BulkInsert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn row<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }
}

/// UPDATE description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub table: String,
    pub data: Data,
    pub condition: Condition,
    pub order: Order,
    pub limit: Option<Limit>,
}

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data = self.data.set(column, value);
        self
    }

    pub fn data(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn order_by(mut self, order: impl Into<Order>) -> Self {
        self.order = order.into();
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn limit_spec(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// DELETE description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: String,
    pub condition: Condition,
    pub order: Order,
    pub limit: Option<Limit>,
}

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn order_by(mut self, order: impl Into<Order>) -> Self {
        self.order = order.into();
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn limit_spec(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Stored routine invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub name: String,
    pub params: Vec<Value>,
}

impl Call {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// INSERT INTO target (…) SELECT … FROM source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CopyRows {
    pub source: String,
    pub target: String,
    /// `(target column, source expression)` pairs.
    pub map: Vec<(Column, Column)>,
    pub condition: Condition,
    pub order: Order,
    pub limit: Option<Limit>,
    pub ignore: bool,
}

impl CopyRows {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn map(mut self, target: impl Into<Column>, source: impl Into<Column>) -> Self {
        self.map.push((target.into(), source.into()));
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn order_by(mut self, order: impl Into<Order>) -> Self {
        self.order = order.into();
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn limit_spec(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn range(mut self, offset: u64, count: u64) -> Self {
        self.limit = Some(Limit::Range(offset, count));
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }
}
