use crate::ast::{Column, ColumnFn, Columns, SelectItem};
use crate::error::{DbError, DbResult};
use crate::transpiler::Compiler;

impl Compiler {
    /// Quote a bare identifier, keeping `.`/`,` qualification.
    ///
    /// A fragment that already contains the quote character, or is the
    /// wildcard, is passed through escaped.
    pub fn identifier(&self, raw: &str) -> String {
        let dialect = self.dialect();
        if raw.contains(dialect.ident_quote) || raw.trim() == "*" {
            return dialect.escape(raw.trim());
        }
        let mut out = String::with_capacity(raw.len() + 4);
        let mut segment = String::new();
        for ch in raw.chars() {
            match ch {
                '.' => {
                    out.push_str(&self.segment(&segment));
                    out.push('.');
                    segment.clear();
                }
                ',' => {
                    out.push_str(&self.segment(&segment));
                    out.push_str(", ");
                    segment.clear();
                }
                c => segment.push(c),
            }
        }
        out.push_str(&self.segment(&segment));
        out
    }

    fn segment(&self, seg: &str) -> String {
        let seg = seg.trim();
        match seg {
            "" => String::new(),
            "*" => "*".to_string(),
            name => self.dialect().quote_ident(&self.dialect().escape(name)),
        }
    }

    /// Table reference; dotted `db.table` is quoted per segment.
    pub fn table(&self, name: &str) -> String {
        self.identifier(name)
    }

    /// Compile one column expression (no alias).
    pub fn column(&self, column: &Column) -> DbResult<String> {
        match column {
            Column::Ident(name) if name.trim().is_empty() => Ok(String::new()),
            Column::Ident(name) => Ok(self.identifier(name)),
            Column::Literal(text) | Column::Value(text) => Ok(self.dialect().quote_value(text)),
            Column::Raw(sql) => Ok(sql.clone()),
            Column::Unknown(name) => self.drop_fragment(DbError::UnknownToken(name.clone())),
            Column::Func(ColumnFn::Now, _) => Ok("NOW()".to_string()),
            Column::Func(ColumnFn::Count, inner) if inner.is_empty() => {
                Ok("COUNT(*)".to_string())
            }
            Column::Func(f, inner) => {
                let x = self.column(inner)?;
                if x.is_empty() {
                    return Ok(String::new());
                }
                Ok(apply(*f, &x))
            }
        }
    }

    /// Compile a column list entry, attaching `AS alias` when allowed.
    pub fn select_item(&self, item: &SelectItem, allow_alias: bool) -> DbResult<String> {
        let sql = self.column(&item.column)?;
        match &item.alias {
            Some(alias) if allow_alias && !sql.is_empty() => Ok(format!(
                "{} AS {}",
                sql,
                self.dialect().quote_ident(alias)
            )),
            _ => Ok(sql),
        }
    }

    /// Compile a column list; an empty list is `*`.
    pub fn columns(&self, columns: &Columns, allow_alias: bool) -> DbResult<String> {
        if columns.is_empty() {
            return Ok("*".to_string());
        }
        let mut parts = Vec::with_capacity(columns.0.len());
        for item in columns.iter() {
            let sql = self.select_item(item, allow_alias)?;
            if !sql.is_empty() {
                parts.push(sql);
            }
        }
        if parts.is_empty() {
            return Ok("*".to_string());
        }
        Ok(parts.join(", "))
    }
}

fn apply(f: ColumnFn, x: &str) -> String {
    match f {
        ColumnFn::Distinct => format!("DISTINCT {}", x),
        ColumnFn::NoCache => format!("SQL_NO_CACHE {}", x),
        ColumnFn::HighPriority => format!("HIGH_PRIORITY {}", x),
        ColumnFn::LowPriority => format!("LOW_PRIORITY {}", x),
        ColumnFn::Max => format!("MAX({})", x),
        ColumnFn::Min => format!("MIN({})", x),
        ColumnFn::Sum => format!("SUM({})", x),
        ColumnFn::Count => format!("COUNT({})", x),
        ColumnFn::Length => format!("LENGTH({})", x),
        ColumnFn::Time => format!("TIME({})", x),
        ColumnFn::Timestamp => format!("UNIX_TIMESTAMP({})", x),
        ColumnFn::Date => format!("DATE({})", x),
        ColumnFn::Day => format!("DAY({})", x),
        ColumnFn::Month => format!("MONTH({})", x),
        ColumnFn::Year => format!("YEAR({})", x),
        ColumnFn::Now => "NOW()".to_string(),
        ColumnFn::FromUnixtime => format!("FROM_UNIXTIME({})", x),
        ColumnFn::FromUnixtimeDate => format!("FROM_UNIXTIME({}, '%Y-%m-%d')", x),
    }
}
