//! Connection configuration from `dynsql.toml`.
//!
//! ```toml
//! [database]
//! driver = "mysql"
//! host = "127.0.0.1"
//! user = "app"
//! database = "shop"
//! query_mode = "use"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::driver::QueryMode;
use crate::error::{DbError, DbResult};

pub const CONFIG_FILE: &str = "dynsql.toml";

/// Settings of one database connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Registry name of the driver (`mysql`, `recording`, `dry-run`).
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub collation: Option<String>,
    /// Seconds.
    pub connect_timeout: u64,
    /// Accepted for compatibility; connections are never shared between processes.
    pub persistent: bool,
    pub query_mode: QueryMode,
    /// Reject malformed fragments instead of dropping them.
    pub strict: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: "mysql".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            charset: "utf8mb4".to_string(),
            collation: None,
            connect_timeout: 10,
            persistent: false,
            query_mode: QueryMode::Store,
            strict: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: DbConfig,
}

impl DbConfig {
    /// Parse the `[database]` table of a TOML document.
    pub fn from_toml(content: &str) -> DbResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        file.database.validate()
    }

    pub fn from_file(path: &Path) -> DbResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from `explicit`, `./dynsql.toml` or the user config directory,
    /// falling back to defaults, then apply `DYNSQL_*` overrides.
    pub fn load(explicit: Option<&Path>) -> DbResult<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::search_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("dynsql").join("config.toml"));
        }
        paths
    }

    /// Apply overrides from an environment lookup.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        if let Some(host) = lookup("DYNSQL_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DYNSQL_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| DbError::Config(format!("DYNSQL_PORT is not a port: {}", port)))?;
        }
        if let Some(user) = lookup("DYNSQL_USER") {
            self.user = user;
        }
        if let Some(password) = lookup("DYNSQL_PASSWORD") {
            self.password = password;
        }
        if let Some(database) = lookup("DYNSQL_DATABASE") {
            self.database = database;
        }
        self.validate()
    }

    fn validate(self) -> DbResult<Self> {
        if self.driver.trim().is_empty() {
            return Err(DbError::Config("driver must not be empty".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(DbError::Config("host must not be empty".to_string()));
        }
        if self.connect_timeout == 0 {
            return Err(DbError::Config("connect_timeout must be at least 1 second".to_string()));
        }
        Ok(self)
    }
}
