//! Error types for dynsql.

use thiserror::Error;

/// The main error type for dynsql operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configured driver name has no registered implementation.
    #[error("Unknown driver: '{0}'. Expected: mysql or recording")]
    UnknownDriver(String),

    /// Network or authentication failure while connecting, or a lost connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was issued before `connect()`.
    #[error("Not connected")]
    NotConnected,

    /// The backend rejected a statement.
    #[error("Query error {code}: {message} [SQL: {sql}]")]
    Query {
        code: u16,
        message: String,
        sql: String,
    },

    /// Malformed limit specification.
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Malformed argument shape, raised before any network I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unrecognised `{DB_…}` token (strict mode only).
    #[error("Unknown token: '{{DB_{0}}}'")]
    UnknownToken(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// Create a query error for the given backend code and offending SQL.
    pub fn query(code: u16, message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self::Query {
            code,
            message: message.into(),
            sql: sql.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for failures of the connection itself rather than of a statement.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::NotConnected)
    }
}

/// Result type alias for dynsql operations.
pub type DbResult<T> = Result<T, DbError>;
