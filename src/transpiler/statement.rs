use crate::ast::*;
use crate::error::{DbError, DbResult};
use crate::transpiler::{Compiler, ToSql};

impl ToSql for Select {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler.select(self)
    }
}

impl ToSql for Insert {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler.insert(self)
    }
}

impl ToSql for BulkInsert {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler
            .bulk_insert(self)?
            .ok_or_else(|| DbError::invalid(format!("no valid rows for {}", self.table)))
    }
}

impl ToSql for Update {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler.update(self)
    }
}

impl ToSql for Delete {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler.delete(self)
    }
}

impl ToSql for Call {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler.call(self)
    }
}

impl ToSql for CopyRows {
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String> {
        compiler.copy(self)
    }
}

impl Compiler {
    /// `" ORDER BY …"`, or an empty string.
    pub fn order(&self, order: &Order) -> DbResult<String> {
        match order {
            Order::Random => Ok(" ORDER BY RAND()".to_string()),
            Order::By(keys) => {
                let mut parts = Vec::with_capacity(keys.len());
                for (column, direction) in keys {
                    let col = self.column(column)?;
                    if !col.is_empty() {
                        parts.push(format!("{} {}", col, direction.as_sql()));
                    }
                }
                if parts.is_empty() {
                    return Ok(String::new());
                }
                Ok(format!(" ORDER BY {}", parts.join(", ")))
            }
        }
    }

    /// `" GROUP BY …"`, or an empty string.
    pub fn group(&self, group: &[Column]) -> DbResult<String> {
        let mut parts = Vec::with_capacity(group.len());
        for column in group {
            let col = self.column(column)?;
            if !col.is_empty() {
                parts.push(col);
            }
        }
        if parts.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(" GROUP BY {}", parts.join(", ")))
    }

    pub fn limit(&self, limit: Option<&Limit>) -> String {
        match limit {
            None => String::new(),
            Some(Limit::Count(n)) => format!(" LIMIT {}", n),
            Some(Limit::Range(offset, count)) => format!(" LIMIT {}, {}", offset, count),
        }
    }

    /// UPDATE and DELETE take a row count only.
    fn write_limit(&self, statement: &str, limit: Option<&Limit>) -> DbResult<String> {
        match limit {
            Some(Limit::Range(offset, count)) => Err(DbError::InvalidLimit(format!(
                "{} accepts a row count, got range {}, {}",
                statement, offset, count
            ))),
            other => Ok(self.limit(other)),
        }
    }

    pub fn select(&self, q: &Select) -> DbResult<String> {
        let mut sql = String::from("SELECT ");
        sql.push_str(&self.columns(&q.columns, true)?);
        sql.push_str(" FROM ");
        sql.push_str(&self.table(&q.table));
        sql.push_str(&self.condition(&q.condition)?);
        sql.push_str(&self.group(&q.group)?);
        sql.push_str(&self.having(&q.having)?);
        sql.push_str(&self.order(&q.order)?);
        sql.push_str(&self.limit(q.limit.as_ref()));
        if let Some(lock) = q.lock {
            sql.push_str(lock.as_sql());
        }
        Ok(sql)
    }

    fn assignments(&self, data: &Data) -> DbResult<String> {
        let mut parts = Vec::with_capacity(data.len());
        for (name, value) in data.iter() {
            let target = Column::ident(name.as_str());
            parts.push(format!(
                "{} = {}",
                self.identifier(name),
                self.value(value, Some(&target))?
            ));
        }
        Ok(parts.join(", "))
    }

    fn on_duplicate<'a>(&self, names: impl Iterator<Item = &'a String>) -> String {
        let parts: Vec<String> = names
            .map(|name| {
                let col = self.identifier(name);
                format!("{} = VALUES({})", col, col)
            })
            .collect();
        format!(" ON DUPLICATE KEY UPDATE {}", parts.join(", "))
    }

    pub fn insert(&self, q: &Insert) -> DbResult<String> {
        if q.data.is_empty() {
            return Err(DbError::invalid(format!("nothing to insert into {}", q.table)));
        }
        let mut sql = String::from(if q.ignore { "INSERT IGNORE INTO " } else { "INSERT INTO " });
        sql.push_str(&self.table(&q.table));
        sql.push_str(" SET ");
        sql.push_str(&self.assignments(&q.data)?);
        if q.upsert {
            sql.push_str(&self.on_duplicate(q.data.iter().map(|(name, _)| name)));
        }
        Ok(sql)
    }

    /// Multi-row insert. Rows whose arity differs from `fields` are dropped;
    /// `None` means no row survived.
    pub fn bulk_insert(&self, q: &BulkInsert) -> DbResult<Option<String>> {
        if q.fields.is_empty() {
            return Err(DbError::invalid(format!("no fields for bulk insert into {}", q.table)));
        }
        let targets: Vec<Column> = q.fields.iter().map(|f| Column::ident(f.as_str())).collect();
        let mut rows = Vec::with_capacity(q.rows.len());
        for (index, row) in q.rows.iter().enumerate() {
            if row.len() != q.fields.len() {
                self.drop_fragment(DbError::invalid(format!(
                    "row {} has {} values for {} fields",
                    index,
                    row.len(),
                    q.fields.len()
                )))?;
                continue;
            }
            let values = row
                .iter()
                .zip(&targets)
                .map(|(value, target)| self.value(value, Some(target)))
                .collect::<DbResult<Vec<_>>>()?;
            rows.push(format!("({})", values.join(", ")));
        }
        if rows.is_empty() {
            self.drop_fragment(DbError::invalid(format!(
                "empty bulk insert into {}",
                q.table
            )))?;
            return Ok(None);
        }

        let mut sql = String::from(if q.ignore { "INSERT IGNORE INTO " } else { "INSERT INTO " });
        sql.push_str(&self.table(&q.table));
        let fields: Vec<String> = q.fields.iter().map(|f| self.identifier(f)).collect();
        sql.push_str(&format!(" ({}) VALUES ", fields.join(", ")));
        sql.push_str(&rows.join(", "));
        if q.upsert {
            sql.push_str(&self.on_duplicate(q.fields.iter()));
        }
        Ok(Some(sql))
    }

    pub fn update(&self, q: &Update) -> DbResult<String> {
        if q.data.is_empty() {
            return Err(DbError::invalid(format!("nothing to update in {}", q.table)));
        }
        let mut sql = String::from("UPDATE ");
        sql.push_str(&self.table(&q.table));
        sql.push_str(" SET ");
        sql.push_str(&self.assignments(&q.data)?);
        sql.push_str(&self.condition(&q.condition)?);
        sql.push_str(&self.order(&q.order)?);
        sql.push_str(&self.write_limit("UPDATE", q.limit.as_ref())?);
        Ok(sql)
    }

    pub fn delete(&self, q: &Delete) -> DbResult<String> {
        let mut sql = String::from("DELETE FROM ");
        sql.push_str(&self.table(&q.table));
        sql.push_str(&self.condition(&q.condition)?);
        sql.push_str(&self.order(&q.order)?);
        sql.push_str(&self.write_limit("DELETE", q.limit.as_ref())?);
        Ok(sql)
    }

    pub fn call(&self, q: &Call) -> DbResult<String> {
        let params = q
            .params
            .iter()
            .map(|v| self.value(v, None))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(format!("CALL {}({})", self.identifier(&q.name), params.join(", ")))
    }

    pub fn copy(&self, q: &CopyRows) -> DbResult<String> {
        if q.map.is_empty() {
            return Err(DbError::invalid(format!(
                "no column map for copy from {} to {}",
                q.source, q.target
            )));
        }
        let mut targets = Vec::with_capacity(q.map.len());
        let mut sources = Vec::with_capacity(q.map.len());
        for (target, source) in &q.map {
            let t = self.column(target)?;
            let s = self.column(source)?;
            if t.is_empty() || s.is_empty() {
                continue;
            }
            targets.push(t);
            sources.push(s);
        }
        if targets.is_empty() {
            return Err(DbError::invalid(format!(
                "column map for copy from {} compiled to nothing",
                q.source
            )));
        }

        let mut sql = String::from(if q.ignore { "INSERT IGNORE INTO " } else { "INSERT INTO " });
        sql.push_str(&self.table(&q.target));
        sql.push_str(&format!(" ({}) SELECT {} FROM ", targets.join(", "), sources.join(", ")));
        sql.push_str(&self.table(&q.source));
        sql.push_str(&self.condition(&q.condition)?);
        sql.push_str(&self.order(&q.order)?);
        sql.push_str(&self.limit(q.limit.as_ref()));
        Ok(sql)
    }

    pub fn lock_tables(&self, tables: &[(String, TableLock)]) -> DbResult<String> {
        if tables.is_empty() {
            return Err(DbError::invalid("no tables to lock"));
        }
        let parts: Vec<String> = tables
            .iter()
            .map(|(table, mode)| format!("{} {}", self.table(table), mode.as_sql()))
            .collect();
        Ok(format!("LOCK TABLES {}", parts.join(", ")))
    }

    pub fn unlock_tables(&self) -> String {
        "UNLOCK TABLES".to_string()
    }
}
