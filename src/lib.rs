//! # dynsql
//!
//! Compiles structured query descriptions into MySQL text and runs them
//! through a pluggable driver.
//!
//! ## Quick Example
//!
//! ```
//! use dynsql::prelude::*;
//!
//! let q = Select::new("users")
//!     .columns(vec!["id", "{DB_COUNT}*"])
//!     .filter(Condition::new().entry("age", "{DB_GE}18").is_in("state", ["a", "b"]))
//!     .group_by("id");
//!
//! let sql = q.to_sql(&Compiler::default()).unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT `id`, COUNT(*) FROM `users` WHERE `age` >= 18 AND `state` IN ('a','b') GROUP BY `id`"
//! );
//! ```
//!
//! ## Tokens
//!
//! | Where            | Tokens                                                        |
//! |------------------|---------------------------------------------------------------|
//! | columns          | `{DB_SUM}`, `{DB_COUNT}`, `{DB_DISTINCT}`, `{DB_FNC}`, …      |
//! | condition values | `{DB_GE}`, `{DB_NE}`, `{DB_LIKE}`, `{DB_INULL}`, …            |
//! | write values     | `{DB_INC}`, `{DB_NOW}`, `{DB_COL}`, `{DB_FNC}`, …             |
//! | condition flow   | `{DB_AND}`, `{DB_OR}`, `{DB_XOR}`, `{DB_LB}`, `{DB_RB}`       |
//! | order            | `{DB_RAND}`                                                   |

pub mod ast;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod parser;
pub mod timing;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::DbConfig;
    pub use crate::driver::{Driver, QueryMode, Record, RecordingDriver, ResultSet};
    pub use crate::engine::{ActionOutcome, QueryBuilder};
    pub use crate::error::*;
    pub use crate::transpiler::{Compiler, Dialect, ToSql};
}
