//! MySQL driver on sqlx.
//!
//! The public API is blocking: the driver owns a small tokio runtime and
//! every call waits on it. Statements are sent as plain text (values are
//! inlined and escaped by the compiler), so multi-result CALLs and
//! `LOCK TABLES` work without server-side preparation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use futures::TryStreamExt;
use serde_json::Value as Json;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::{Column, Connection, Either, Executor, Row, TypeInfo, ValueRef};
use tokio::runtime::Runtime;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::DbConfig;
use crate::driver::{
    BackendError, Driver, MultiResult, QueryMode, Record, ResultSet, StreamItem, TransactionState,
    returns_rows,
};
use crate::error::{DbError, DbResult};
use crate::timing::{QueryTimer, TimingCategory, measure};
use crate::transpiler::Dialect;

/// Rows buffered between the reader task and a streaming handle.
const STREAM_BUFFER: usize = 64;

type SharedConnection = Arc<Mutex<MySqlConnection>>;

/// Reader task of the current streaming handle.
struct ActiveStream {
    abort: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct MySqlDriver {
    config: DbConfig,
    timer: Arc<dyn QueryTimer>,
    runtime: Runtime,
    conn: Option<SharedConnection>,
    stream: Option<ActiveStream>,
    mode: QueryMode,
    tx: TransactionState,
    generation: Arc<AtomicU64>,
    insert_id: u64,
    affected_rows: u64,
    last_error: Option<BackendError>,
}

impl MySqlDriver {
    pub fn new(config: DbConfig, timer: Arc<dyn QueryTimer>) -> DbResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dynsql-mysql")
            .enable_all()
            .build()?;
        Ok(Self {
            mode: config.query_mode,
            config,
            timer,
            runtime,
            conn: None,
            stream: None,
            tx: TransactionState::default(),
            generation: Arc::new(AtomicU64::new(0)),
            insert_id: 0,
            affected_rows: 0,
            last_error: None,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    fn options(&self) -> MySqlConnectOptions {
        let c = &self.config;
        let mut options = MySqlConnectOptions::new()
            .host(&c.host)
            .port(c.port)
            .username(&c.user)
            .charset(&c.charset);
        if !c.password.is_empty() {
            options = options.password(&c.password);
        }
        if !c.database.is_empty() {
            options = options.database(&c.database);
        }
        if let Some(collation) = &c.collation {
            options = options.collation(collation);
        }
        options
    }

    fn connection(&self) -> DbResult<SharedConnection> {
        self.conn.clone().ok_or(DbError::NotConnected)
    }

    /// Cancel the reader of the previous streaming handle and wait for it,
    /// so the connection lock is free again.
    fn release_stream(&mut self) {
        if let Some(active) = self.stream.take() {
            let _ = active.abort.send(());
            if let Err(err) = self.runtime.block_on(active.handle) {
                if err.is_panic() {
                    tracing::warn!("stream reader panicked");
                }
            }
        }
    }

    /// Common preamble of every statement: supersede the current handle and
    /// issue the deferred BEGIN when needed.
    fn prepare(&mut self, sql: &str) -> DbResult<SharedConnection> {
        let conn = self.connection()?;
        self.release_stream();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.tx.needs_begin(sql) {
            self.control(&conn, "BEGIN")?;
            self.tx.mark_started();
            tracing::debug!("transaction started");
        }
        Ok(conn)
    }

    /// Buffered round-trip for transaction control statements.
    fn control(&mut self, conn: &SharedConnection, sql: &str) -> DbResult<()> {
        tracing::debug!(sql, "executing");
        let timer = Arc::clone(&self.timer);
        let result = measure(timer.as_ref(), sql, TimingCategory::Query, || {
            run_buffered(&self.runtime, conn, sql)
        });
        self.settle(result).map(drop)
    }

    /// Bookkeeping after a round-trip. A lost connection is dropped together
    /// with any open transaction.
    fn settle<T>(&mut self, result: DbResult<T>) -> DbResult<T> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(DbError::Query { code, message, .. }) => {
                self.last_error = Some(BackendError {
                    code: *code,
                    message: message.clone(),
                });
            }
            Err(err) if err.is_connection() => {
                tracing::warn!(error = %err, "connection lost");
                self.conn = None;
                self.tx.clear();
            }
            Err(_) => {}
        }
        result
    }

    fn track(&mut self, rs: &ResultSet) {
        self.affected_rows = rs.affected_rows();
        if rs.field_count() == 0 {
            self.insert_id = rs.insert_id();
        }
    }

    fn run_streaming(&mut self, conn: SharedConnection, sql: &str) -> DbResult<ResultSet> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let (abort, mut aborted) = oneshot::channel::<()>();
        let sql = sql.to_string();

        let handle = self.runtime.spawn(async move {
            let mut guard = conn.lock_owned().await;
            let conn: &mut MySqlConnection = &mut guard;
            let mut rows = conn.fetch_many(sql.as_str());
            let mut columns: Option<Arc<[String]>> = None;
            loop {
                let item = tokio::select! {
                    _ = &mut aborted => break,
                    item = rows.try_next() => item,
                };
                let message = match item {
                    Ok(Some(Either::Right(row))) => {
                        let names = columns.get_or_insert_with(|| column_names(&row));
                        match decode_row(&row) {
                            Ok(values) => StreamItem::Row(Record::new(Arc::clone(names), values)),
                            Err(err) => StreamItem::Error(map_error(err, &sql)),
                        }
                    }
                    Ok(Some(Either::Left(done))) => StreamItem::Done {
                        affected: done.rows_affected(),
                        insert_id: done.last_insert_id(),
                    },
                    Ok(None) => break,
                    Err(err) => StreamItem::Error(map_error(err, &sql)),
                };
                let last = !matches!(message, StreamItem::Row(_));
                tokio::select! {
                    _ = &mut aborted => break,
                    sent = tx.send(message) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                if last {
                    break;
                }
            }
        });

        self.stream = Some(ActiveStream { abort, handle });
        ResultSet::open_stream(rx)
    }
}

fn run_buffered(runtime: &Runtime, conn: &SharedConnection, sql: &str) -> DbResult<Vec<ResultSet>> {
    runtime.block_on(async {
        let mut guard = conn.lock().await;
        let conn: &mut MySqlConnection = &mut guard;
        let mut stream = conn.fetch_many(sql);
        let mut sets = Vec::new();
        let mut rows = Vec::new();
        let mut columns: Option<Arc<[String]>> = None;
        while let Some(item) = stream.try_next().await.map_err(|e| map_error(e, sql))? {
            match item {
                Either::Left(done) => {
                    let names = columns.take().unwrap_or_else(|| Arc::from(Vec::new()));
                    sets.push(
                        ResultSet::buffered(names, std::mem::take(&mut rows))
                            .with_counts(done.rows_affected(), done.last_insert_id()),
                    );
                }
                Either::Right(row) => {
                    if columns.is_none() {
                        columns = Some(column_names(&row));
                    }
                    rows.push(decode_row(&row).map_err(|e| map_error(e, sql))?);
                }
            }
        }
        drop(stream);

        // The text protocol sends no row to take names from.
        if let [only] = sets.as_mut_slice() {
            if only.field_count() == 0 && returns_rows(sql) {
                match (&mut *guard).describe(sql).await {
                    Ok(described) => {
                        let names: Vec<String> = described
                            .columns()
                            .iter()
                            .map(|c| c.name().to_string())
                            .collect();
                        *only = ResultSet::buffered(names.into(), Vec::new())
                            .with_counts(only.affected_rows(), only.insert_id());
                    }
                    Err(err) => tracing::debug!(%err, sql, "column names unavailable"),
                }
            }
        }
        Ok(sets)
    })
}

fn column_names(row: &MySqlRow) -> Arc<[String]> {
    row.columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into()
}

/// Convert a row to JSON cells by column type.
fn decode_row(row: &MySqlRow) -> Result<Vec<Json>, sqlx::Error> {
    let mut values = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(i)?.is_null() {
            values.push(Json::Null);
            continue;
        }
        let value = match column.type_info().name() {
            "BOOLEAN" => Json::Bool(row.try_get_unchecked::<bool, _>(i)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                Json::from(row.try_get_unchecked::<i64, _>(i)?)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => Json::from(row.try_get_unchecked::<u64, _>(i)?),
            "FLOAT" | "DOUBLE" => serde_json::Number::from_f64(row.try_get_unchecked::<f64, _>(i)?)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            "DATETIME" | "TIMESTAMP" => match row.try_get_unchecked::<NaiveDateTime, _>(i) {
                Ok(dt) => Json::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                Err(_) => Json::String(text(row, i)?),
            },
            "DATE" => match row.try_get_unchecked::<NaiveDate, _>(i) {
                Ok(d) => Json::String(d.format("%Y-%m-%d").to_string()),
                Err(_) => Json::String(text(row, i)?),
            },
            "JSON" => {
                let raw = text(row, i)?;
                serde_json::from_str(&raw).unwrap_or(Json::String(raw))
            }
            _ => Json::String(text(row, i)?),
        };
        values.push(value);
    }
    Ok(values)
}

/// Cell as text; binary cells are decoded lossily.
fn text(row: &MySqlRow, i: usize) -> Result<String, sqlx::Error> {
    match row.try_get_unchecked::<String, _>(i) {
        Ok(s) => Ok(s),
        Err(_) => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(i)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Split sqlx errors into connection failures and statement failures.
fn map_error(err: sqlx::Error, sql: &str) -> DbError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number())
                .unwrap_or(0);
            // CR_SERVER_GONE_ERROR, CR_SERVER_LOST
            if matches!(code, 2006 | 2013) {
                return DbError::Connection(db.message().to_string());
            }
            DbError::query(code, db.message(), sql)
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DbError::Connection(err.to_string()),
        other => DbError::query(0, other.to_string(), sql),
    }
}

impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn dialect(&self) -> Dialect {
        Dialect::MYSQL
    }

    fn connect(&mut self) -> DbResult<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let options = self.options();
        let limit = Duration::from_secs(self.config.connect_timeout);
        let label = format!("{}:{}", self.config.host, self.config.port);
        if self.config.persistent {
            tracing::debug!("persistent connections are not shared; opening a private one");
        }

        let timer = Arc::clone(&self.timer);
        let runtime = &self.runtime;
        let conn = measure(timer.as_ref(), &label, TimingCategory::Connect, || {
            runtime.block_on(async {
                match tokio::time::timeout(limit, MySqlConnection::connect_with(&options)).await {
                    Ok(Ok(conn)) => Ok(conn),
                    Ok(Err(err)) => Err(DbError::Connection(err.to_string())),
                    Err(_) => Err(DbError::Connection(format!(
                        "connect to {} timed out after {}s",
                        label,
                        limit.as_secs()
                    ))),
                }
            })
        })?;

        self.conn = Some(Arc::new(Mutex::new(conn)));
        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            "connected"
        );
        Ok(())
    }

    fn disconnect(&mut self) -> DbResult<()> {
        self.release_stream();
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        self.tx.reset();

        let timer = Arc::clone(&self.timer);
        let runtime = &self.runtime;
        let result = measure(timer.as_ref(), "disconnect", TimingCategory::Disconnect, || {
            runtime.block_on(async move {
                match Arc::try_unwrap(conn) {
                    Ok(conn) => conn.into_inner().close().await,
                    Err(_) => Ok(()),
                }
            })
        });
        tracing::info!(host = %self.config.host, "disconnected");
        result.map_err(|e| DbError::Connection(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn ping(&mut self) -> DbResult<bool> {
        let Some(conn) = self.conn.clone() else {
            return Ok(false);
        };
        self.release_stream();
        let timer = Arc::clone(&self.timer);
        let runtime = &self.runtime;
        let alive = measure(timer.as_ref(), "ping", TimingCategory::Query, || {
            runtime.block_on(async move { conn.lock().await.ping().await.is_ok() })
        });
        Ok(alive)
    }

    fn query_mode(&self) -> QueryMode {
        self.mode
    }

    fn set_query_mode(&mut self, mode: QueryMode) {
        self.mode = mode;
    }

    fn execute(&mut self, sql: &str) -> DbResult<ResultSet> {
        let conn = self.prepare(sql)?;
        tracing::debug!(sql, mode = ?self.mode, "executing");
        let timer = Arc::clone(&self.timer);
        let result = match self.mode {
            QueryMode::Store => measure(timer.as_ref(), sql, TimingCategory::Query, || {
                run_buffered(&self.runtime, &conn, sql)
            })
            .map(|mut sets| {
                if sets.is_empty() {
                    ResultSet::empty(0, 0)
                } else {
                    sets.swap_remove(0)
                }
            }),
            QueryMode::Use => measure(timer.as_ref(), sql, TimingCategory::Query, || {
                self.run_streaming(conn, sql)
            }),
        };
        let rs = self.settle(result)?;
        self.track(&rs);
        Ok(rs.stamped(&self.generation))
    }

    fn execute_multi(&mut self, sql: &str) -> DbResult<MultiResult> {
        let conn = self.prepare(sql)?;
        tracing::debug!(sql, "executing multi-result statement");
        let timer = Arc::clone(&self.timer);
        let result = measure(timer.as_ref(), sql, TimingCategory::Query, || {
            run_buffered(&self.runtime, &conn, sql)
        });
        let mut sets = self.settle(result)?;
        // A CALL ends with a status packet of its own.
        if sets.len() > 1 && sets.last().is_some_and(|rs| rs.field_count() == 0) {
            if let Some(status) = sets.pop() {
                self.track(&status);
            }
        }
        Ok(MultiResult::new(
            sets.into_iter()
                .map(|rs| rs.stamped(&self.generation))
                .collect(),
        ))
    }

    fn insert_id(&self) -> u64 {
        self.insert_id
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn tran_start(&mut self) {
        self.tx.arm();
        tracing::debug!("transaction armed");
    }

    fn tran_end(&mut self) {
        self.tx.disarm();
        tracing::debug!("transaction disarmed");
    }

    fn commit(&mut self) -> DbResult<()> {
        if !self.tx.in_transaction() {
            return Ok(());
        }
        let conn = self.connection()?;
        self.release_stream();
        self.control(&conn, "COMMIT")?;
        self.tx.clear();
        tracing::debug!("transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if let Ok(conn) = self.connection() {
            self.release_stream();
            let result = self.control(&conn, "ROLLBACK");
            self.tx.clear();
            result?;
            tracing::debug!("transaction rolled back");
        } else {
            self.tx.clear();
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.in_transaction()
    }

    fn is_armed(&self) -> bool {
        self.tx.is_armed()
    }

    fn last_error(&self) -> Option<&BackendError> {
        self.last_error.as_ref()
    }
}

impl Drop for MySqlDriver {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TracingTimer;

    fn driver(port: u16) -> MySqlDriver {
        let config = DbConfig {
            port,
            connect_timeout: 2,
            ..DbConfig::default()
        };
        MySqlDriver::new(config, Arc::new(TracingTimer)).unwrap()
    }

    #[test]
    fn test_statement_before_connect() {
        let mut d = driver(3306);
        assert!(!d.is_connected());
        assert!(matches!(d.execute("SELECT 1"), Err(DbError::NotConnected)));
        assert!(!d.ping().unwrap());
        d.disconnect().unwrap();
    }

    #[test]
    fn test_commit_and_rollback_without_connection() {
        let mut d = driver(3306);
        d.tran_start();
        assert!(d.is_armed());
        d.commit().unwrap();
        d.rollback().unwrap();
        assert!(!d.in_transaction());
    }

    #[test]
    fn test_refused_connect_is_connection_error() {
        let mut d = driver(1);
        let err = d.connect().unwrap_err();
        assert!(err.is_connection(), "{}", err);
        assert!(!d.is_connected());
    }

    #[test]
    fn test_error_mapping() {
        assert!(map_error(sqlx::Error::PoolTimedOut, "SELECT 1").is_connection());
        match map_error(sqlx::Error::RowNotFound, "SELECT 1") {
            DbError::Query { code, sql, .. } => {
                assert_eq!(code, 0);
                assert_eq!(sql, "SELECT 1");
            }
            other => panic!("unexpected: {}", other),
        }
    }
}
