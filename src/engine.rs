//! Query builder: table-level CRUD on top of one driver.
//!
//! Every method compiles its statement with the driver's dialect, runs it
//! and walks the result handle. Handles returned by [`QueryBuilder::select`]
//! and [`QueryBuilder::query`] belong to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut db = QueryBuilder::open(&DbConfig::load(None)?)?;
//! let adults = db.all(
//!     Select::new("users")
//!         .columns(vec!["id", "name"])
//!         .filter(Condition::new().ge("age", 18))
//!         .order_by("name"),
//! )?;
//! ```

use std::sync::Arc;

use serde_json::{Map, Value as Json};

use crate::ast::{Column, Condition, Data, Insert, LockMode, Select, TableLock, Update};
use crate::ast::{BulkInsert, Call, CopyRows, Delete};
use crate::config::DbConfig;
use crate::driver::{self, Driver, Record, ResultSet};
use crate::error::DbResult;
use crate::timing::{QueryTimer, TracingTimer};
use crate::transpiler::{Compiler, ToSql};

/// What [`QueryBuilder::action`] ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// New row with its auto-increment id.
    Inserted(u64),
    /// Rows changed by the update.
    Updated(u64),
}

/// Owns one driver and compiles statements for it.
pub struct QueryBuilder {
    driver: Box<dyn Driver>,
    compiler: Compiler,
    lock: Option<LockMode>,
}

impl QueryBuilder {
    /// Resolve the configured driver and connect.
    pub fn open(config: &DbConfig) -> DbResult<Self> {
        Self::open_with_timer(config, Arc::new(TracingTimer))
    }

    pub fn open_with_timer(config: &DbConfig, timer: Arc<dyn QueryTimer>) -> DbResult<Self> {
        let driver = driver::open(config, timer)?;
        let mut db = Self::new(driver).with_strict(config.strict);
        db.connect()?;
        Ok(db)
    }

    pub fn new(driver: Box<dyn Driver>) -> Self {
        let compiler = Compiler::new(driver.dialect());
        Self {
            driver,
            compiler,
            lock: None,
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.compiler = self.compiler.strict(strict);
        self
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn driver_mut(&mut self) -> &mut dyn Driver {
        self.driver.as_mut()
    }

    pub fn connect(&mut self) -> DbResult<()> {
        self.driver.connect()
    }

    pub fn disconnect(&mut self) -> DbResult<()> {
        self.driver.disconnect()
    }

    pub fn escape(&self, raw: &str) -> String {
        self.driver.escape(raw)
    }

    /// Run raw SQL, connecting first if needed.
    pub fn query(&mut self, sql: &str) -> DbResult<ResultSet> {
        if !self.driver.is_connected() {
            self.driver.connect()?;
        }
        self.driver.execute(sql)
    }

    fn write(&mut self, sql: &str) -> DbResult<ResultSet> {
        self.lock = None;
        self.query(sql)
    }

    /// Apply a row lock to the next SELECT only.
    pub fn lock(&mut self, mode: LockMode) -> &mut Self {
        self.lock = Some(mode);
        self
    }

    /// Compile a SELECT without running it. Consumes a pending lock.
    pub fn select_sql(&mut self, mut q: Select) -> DbResult<String> {
        if let Some(mode) = self.lock.take() {
            q.lock = Some(mode);
        }
        q.to_sql(&self.compiler)
    }

    pub fn select(&mut self, q: Select) -> DbResult<ResultSet> {
        let sql = self.select_sql(q)?;
        self.query(&sql)
    }

    pub fn all(&mut self, q: Select) -> DbResult<Vec<Record>> {
        let mut rs = self.select(q)?;
        let rows = rs.fetch_all()?;
        rs.free();
        Ok(rows)
    }

    /// First row; the query is limited to one row unless it has a limit.
    pub fn one(&mut self, mut q: Select) -> DbResult<Option<Record>> {
        if q.limit.is_none() {
            q = q.limit(1);
        }
        let mut rs = self.select(q)?;
        let row = rs.fetch()?;
        rs.free();
        Ok(row)
    }

    /// First cell of the first row.
    pub fn cell(&mut self, q: Select) -> DbResult<Option<Json>> {
        Ok(self
            .one(q)?
            .and_then(|row| row.into_values().into_iter().next()))
    }

    /// First cell of every row.
    pub fn column(&mut self, q: Select) -> DbResult<Vec<Json>> {
        let mut rs = self.select(q)?;
        let mut out = Vec::new();
        while let Some(row) = rs.fetch_row()? {
            if let Some(first) = row.into_iter().next() {
                out.push(first);
            }
        }
        Ok(out)
    }

    /// First cell as key, second cell (or the first again) as value.
    pub fn column_keyed(&mut self, q: Select) -> DbResult<Map<String, Json>> {
        let mut rs = self.select(q)?;
        let mut out = Map::new();
        while let Some(row) = rs.fetch_row()? {
            let mut cells = row.into_iter();
            let Some(key) = cells.next() else { continue };
            let value = cells.next().unwrap_or_else(|| key.clone());
            out.insert(json_key(&key), value);
        }
        Ok(out)
    }

    /// `COUNT(*)` over the query's condition.
    pub fn count(&mut self, q: Select) -> DbResult<u64> {
        let q = q.columns(Column::count_all());
        Ok(self.cell(q)?.as_ref().map(json_u64).unwrap_or(0))
    }

    /// `SUM(column)` over the query's condition; no rows sum to zero.
    pub fn sum(&mut self, q: Select, column: impl Into<Column>) -> DbResult<f64> {
        let q = q.columns(Column::sum(column));
        Ok(self.cell(q)?.as_ref().map(json_f64).unwrap_or(0.0))
    }

    /// Insert one row and return its auto-increment id, 0 when nothing was inserted.
    pub fn insert(&mut self, q: Insert) -> DbResult<u64> {
        let sql = q.to_sql(&self.compiler)?;
        Ok(self.write(&sql)?.insert_id())
    }

    /// `INSERT … ON DUPLICATE KEY UPDATE` for every supplied column.
    pub fn insert_update(&mut self, q: Insert) -> DbResult<u64> {
        self.insert(q.upsert())
    }

    /// Multi-row insert. Returns false when no row was left to send.
    pub fn inserts(&mut self, q: BulkInsert) -> DbResult<bool> {
        self.lock = None;
        match self.compiler.bulk_insert(&q)? {
            Some(sql) => {
                self.write(&sql)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn inserts_update(&mut self, q: BulkInsert) -> DbResult<bool> {
        self.inserts(q.upsert())
    }

    /// Returns the affected row count.
    pub fn update(&mut self, q: Update) -> DbResult<u64> {
        let sql = q.to_sql(&self.compiler)?;
        Ok(self.write(&sql)?.affected_rows())
    }

    /// Returns the affected row count.
    pub fn delete(&mut self, q: Delete) -> DbResult<u64> {
        let sql = q.to_sql(&self.compiler)?;
        Ok(self.write(&sql)?.affected_rows())
    }

    /// Update the rows matching `condition`, or insert when there is no
    /// condition. With `check`, a condition matching nothing also inserts.
    pub fn action(
        &mut self,
        table: &str,
        data: Data,
        condition: Condition,
        check: bool,
        ignore: bool,
    ) -> DbResult<ActionOutcome> {
        let has_condition = !condition.is_empty();
        let matched = if check && has_condition {
            self.count(Select::new(table).filter(condition.clone()))? > 0
        } else {
            true
        };

        if has_condition && matched {
            let q = Update::new(table).data(data).filter(condition);
            return Ok(ActionOutcome::Updated(self.update(q)?));
        }
        let mut q = Insert::new(table).data(data);
        if ignore {
            q = q.ignore();
        }
        Ok(ActionOutcome::Inserted(self.insert(q)?))
    }

    /// Rows of the routine's first result set; later sets are discarded.
    pub fn procedure(&mut self, q: Call) -> DbResult<Vec<Record>> {
        let mut multi = self.call(q)?;
        let rows = match multi.next_result() {
            Some(mut first) => first.fetch_all()?,
            None => Vec::new(),
        };
        multi.clear();
        Ok(rows)
    }

    /// Rows of every result set of the routine.
    pub fn procedure_all(&mut self, q: Call) -> DbResult<Vec<Vec<Record>>> {
        let mut multi = self.call(q)?;
        let mut out = Vec::with_capacity(multi.remaining());
        while let Some(mut rs) = multi.next_result() {
            out.push(rs.fetch_all()?);
        }
        Ok(out)
    }

    fn call(&mut self, q: Call) -> DbResult<driver::MultiResult> {
        self.lock = None;
        let sql = q.to_sql(&self.compiler)?;
        if !self.driver.is_connected() {
            self.driver.connect()?;
        }
        self.driver.execute_multi(&sql)
    }

    /// `INSERT INTO target (…) SELECT … FROM source`; returns the copied row count.
    pub fn copy(&mut self, q: CopyRows) -> DbResult<u64> {
        let sql = q.to_sql(&self.compiler)?;
        Ok(self.write(&sql)?.affected_rows())
    }

    pub fn lock_table(&mut self, tables: &[(&str, TableLock)]) -> DbResult<()> {
        let tables: Vec<(String, TableLock)> = tables
            .iter()
            .map(|(name, mode)| (name.to_string(), *mode))
            .collect();
        let sql = self.compiler.lock_tables(&tables)?;
        self.write(&sql).map(drop)
    }

    pub fn unlock_table(&mut self) -> DbResult<()> {
        let sql = self.compiler.unlock_tables();
        self.write(&sql).map(drop)
    }

    pub fn tran_start(&mut self) {
        self.driver.tran_start();
    }

    pub fn tran_end(&mut self) {
        self.driver.tran_end();
    }

    pub fn commit(&mut self) -> DbResult<()> {
        self.driver.commit()
    }

    pub fn rollback(&mut self) -> DbResult<()> {
        self.driver.rollback()
    }

    pub fn in_transaction(&self) -> bool {
        self.driver.in_transaction()
    }
}

impl Drop for QueryBuilder {
    fn drop(&mut self) {
        let _ = self.driver.disconnect();
    }
}

fn json_key(v: &Json) -> String {
    match v {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_u64(v: &Json) -> u64 {
    match v {
        Json::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Json::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// DECIMAL sums arrive as strings.
fn json_f64(v: &Json) -> f64 {
    match v {
        Json::Number(n) => n.as_f64().unwrap_or(0.0),
        Json::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_numbers() {
        assert_eq!(json_u64(&json!(12)), 12);
        assert_eq!(json_u64(&json!("7")), 7);
        assert_eq!(json_u64(&Json::Null), 0);
        assert_eq!(json_f64(&json!("10.50")), 10.5);
        assert_eq!(json_f64(&json!(2)), 2.0);
        assert_eq!(json_key(&json!(3)), "3");
        assert_eq!(json_key(&json!("a")), "a");
    }
}
