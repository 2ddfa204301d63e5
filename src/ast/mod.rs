//! Typed query description.
//!
//! The `{DB_…}` token strings of existing call sites are parsed into these
//! types by [`crate::parser`]; the compilers in [`crate::transpiler`] only
//! ever see the typed form.

pub mod clauses;
pub mod cmd;
pub mod column;
pub mod condition;
pub mod value;

pub use self::clauses::{Direction, Limit, LockMode, Order, TableLock};
pub use self::cmd::{BulkInsert, Call, CopyRows, Data, Delete, Insert, Select, Update};
pub use self::column::{Column, ColumnFn, Columns, SelectItem};
pub use self::condition::{Clause, Condition, Logic, Test};
pub use self::value::{DeltaOp, Number, Value, WriteExpr};
