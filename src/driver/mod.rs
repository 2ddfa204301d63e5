//! Backend drivers.
//!
//! A [`Driver`] owns one connection, the lazy transaction state and the
//! generation counter that marks the current result handle. Drivers are
//! resolved by name through [`open`].

pub mod mysql;
pub mod recording;
mod result;
mod transaction;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use self::mysql::MySqlDriver;
pub use self::recording::{Recorder, RecordingDriver};
pub use self::result::{MultiResult, Record, ResultSet, StreamItem};
pub use self::transaction::{TransactionState, is_exempt, returns_rows};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::timing::QueryTimer;
use crate::transpiler::Dialect;

/// How rows are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Buffer the whole result client-side.
    #[default]
    Store,
    /// Stream rows from the connection while fetching.
    Use,
}

/// Error reported by the backend for the last statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub code: u16,
    pub message: String,
}

/// Capability contract of a backend.
pub trait Driver: Send {
    fn name(&self) -> &'static str;

    fn dialect(&self) -> Dialect;

    fn connect(&mut self) -> DbResult<()>;

    /// Close the connection. Disconnecting twice is not an error.
    fn disconnect(&mut self) -> DbResult<()>;

    fn is_connected(&self) -> bool;

    fn ping(&mut self) -> DbResult<bool>;

    fn escape(&self, raw: &str) -> String {
        self.dialect().escape(raw)
    }

    fn query_mode(&self) -> QueryMode;

    fn set_query_mode(&mut self, mode: QueryMode);

    /// Run one statement. The previous handle stops being current.
    fn execute(&mut self, sql: &str) -> DbResult<ResultSet>;

    /// Run a statement that may return several result sets (stored routines).
    fn execute_multi(&mut self, sql: &str) -> DbResult<MultiResult>;

    fn insert_id(&self) -> u64;

    fn affected_rows(&self) -> u64;

    /// Arm the controller; `BEGIN` is deferred to the first mutating statement.
    fn tran_start(&mut self);

    fn tran_end(&mut self);

    /// `COMMIT` if a transaction is open, otherwise nothing.
    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    fn in_transaction(&self) -> bool;

    fn is_armed(&self) -> bool;

    fn last_error(&self) -> Option<&BackendError>;
}

/// Resolve a driver by its configured name.
pub fn open(config: &DbConfig, timer: Arc<dyn QueryTimer>) -> DbResult<Box<dyn Driver>> {
    let name = config.driver.trim().to_ascii_lowercase();
    match name.as_str() {
        "mysql" => Ok(Box::new(MySqlDriver::new(config.clone(), timer)?)),
        "recording" | "dry-run" => Ok(Box::new(
            RecordingDriver::new()
                .with_timer(timer)
                .with_query_mode(config.query_mode),
        )),
        _ => Err(DbError::UnknownDriver(config.driver.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TracingTimer;

    #[test]
    fn test_registry() {
        let timer: Arc<dyn QueryTimer> = Arc::new(TracingTimer);
        let config = DbConfig {
            driver: "Dry-Run".into(),
            ..DbConfig::default()
        };
        let driver = open(&config, timer.clone()).unwrap();
        assert_eq!(driver.name(), "recording");

        let config = DbConfig {
            driver: "oracle".into(),
            ..DbConfig::default()
        };
        match open(&config, timer) {
            Err(DbError::UnknownDriver(name)) => assert_eq!(name, "oracle"),
            other => panic!("unexpected: {:?}", other.map(|d| d.name())),
        }
    }

    #[test]
    fn test_query_mode_serde() {
        assert_eq!(serde_json::to_string(&QueryMode::Use).unwrap(), "\"use\"");
        let mode: QueryMode = serde_json::from_str("\"store\"").unwrap();
        assert_eq!(mode, QueryMode::Store);
    }
}
