use crate::ast::{Column, Value, WriteExpr};
use crate::error::{DbError, DbResult};
use crate::transpiler::Compiler;

impl Compiler {
    /// Compile a value literal or write expression.
    ///
    /// `target` is the addressed column; arithmetic deltas are relative to it
    /// and fail without one.
    pub fn value(&self, value: &Value, target: Option<&Column>) -> DbResult<String> {
        let dialect = self.dialect();
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(b) => Ok(dialect.quote_value(if *b { "1" } else { "0" })),
            Value::Int(n) => Ok(n.to_string()),
            Value::Float(f) if f.is_finite() => Ok(f.to_string()),
            Value::Float(f) => Ok(dialect.quote_value(&f.to_string())),
            Value::Text(s) => Ok(dialect.quote_value(s)),
            Value::Json(j) => Ok(dialect.quote_value(&serde_json::to_string(j)?)),
            Value::Expr(expr) => match expr.as_ref() {
                WriteExpr::Column(c) => self.column(c),
                WriteExpr::Raw(sql) => Ok(sql.clone()),
                WriteExpr::Now => Ok("NOW()".to_string()),
                WriteExpr::Time => Ok("CURRENT_TIME()".to_string()),
                WriteExpr::Delta(op, n) => {
                    let column = target.ok_or_else(|| {
                        DbError::invalid(format!(
                            "arithmetic delta `{} {}` needs a target column",
                            op.symbol(),
                            n
                        ))
                    })?;
                    Ok(format!("{} {} {}", self.column(column)?, op.symbol(), n))
                }
            },
        }
    }
}
