//! SQL compiler for the typed query description.
//!
//! Three expression compilers (column, condition, value) feed the statement
//! builders. All output is deterministic: equal inputs give byte-identical SQL.

mod column;
mod condition;
mod statement;
mod value;

#[cfg(test)]
mod tests;

use crate::error::{DbError, DbResult};

/// How a dialect escapes the inside of a value literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStyle {
    /// MySQL `real_escape_string` rules.
    Backslash,
    /// Double the value quote character.
    Double,
}

/// Quoting characters and escaping rules of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub ident_quote: char,
    pub value_quote: char,
    pub escape: EscapeStyle,
}

impl Dialect {
    pub const MYSQL: Dialect = Dialect {
        ident_quote: '`',
        value_quote: '\'',
        escape: EscapeStyle::Backslash,
    };

    pub const ANSI: Dialect = Dialect {
        ident_quote: '"',
        value_quote: '\'',
        escape: EscapeStyle::Double,
    };

    /// Escape the inside of a value literal.
    pub fn escape(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len() + 8);
        match self.escape {
            EscapeStyle::Backslash => {
                for ch in raw.chars() {
                    match ch {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\\' => out.push_str("\\\\"),
                        '\'' => out.push_str("\\'"),
                        '"' => out.push_str("\\\""),
                        '\x1a' => out.push_str("\\Z"),
                        c => out.push(c),
                    }
                }
            }
            EscapeStyle::Double => {
                for ch in raw.chars() {
                    if ch == self.value_quote {
                        out.push(ch);
                    }
                    out.push(ch);
                }
            }
        }
        out
    }

    /// Quote an identifier; an embedded quote character is doubled.
    pub fn quote_ident(&self, name: &str) -> String {
        let q = self.ident_quote;
        let mut out = String::with_capacity(name.len() + 2);
        out.push(q);
        for ch in name.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    pub fn quote_value(&self, raw: &str) -> String {
        format!("{q}{}{q}", self.escape(raw), q = self.value_quote)
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::MYSQL
    }
}

/// Compiles AST nodes to SQL text for one dialect.
///
/// In lenient mode (the default) malformed fragments are dropped; in strict
/// mode they are reported as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    dialect: Dialect,
    strict: bool,
}

impl Compiler {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Lenient: log and emit nothing. Strict: fail.
    fn drop_fragment(&self, err: DbError) -> DbResult<String> {
        if self.strict {
            return Err(err);
        }
        tracing::debug!(reason = %err, "dropping malformed fragment");
        Ok(String::new())
    }
}

/// Trait for converting statement builders to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string.
    fn to_sql(&self, compiler: &Compiler) -> DbResult<String>;
}
