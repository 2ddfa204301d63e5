//! In-memory driver that records statements instead of sending them.
//!
//! Used by `--dry-run` and by tests. Responses are replayed in order from a
//! queue filled through a [`Recorder`]; statements without a queued response
//! succeed with an empty result.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::driver::{
    BackendError, Driver, MultiResult, QueryMode, ResultSet, StreamItem, TransactionState,
};
use crate::error::{DbError, DbResult};
use crate::timing::{QueryTimer, TimingCategory, TracingTimer, measure};
use crate::transpiler::Dialect;

#[derive(Debug)]
enum Response {
    Result(ResultSet),
    Multi(Vec<ResultSet>),
    Error(DbError),
}

#[derive(Debug, Default)]
struct Shared {
    statements: Vec<String>,
    responses: VecDeque<Response>,
}

/// Shared view of a [`RecordingDriver`], usable after the driver is boxed.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    shared: Arc<Mutex<Shared>>,
}

impl Recorder {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement sent so far, including transaction control.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        self.lock().statements.last().cloned()
    }

    pub fn count(&self, statement: &str) -> usize {
        self.lock()
            .statements
            .iter()
            .filter(|s| s.as_str() == statement)
            .count()
    }

    pub fn clear(&self) {
        self.lock().statements.clear();
    }

    pub fn push_result(&self, result: ResultSet) {
        self.lock().responses.push_back(Response::Result(result));
    }

    pub fn push_rows<S: Into<String>>(
        &self,
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<serde_json::Value>>,
    ) {
        self.push_result(ResultSet::from_rows(columns, rows));
    }

    pub fn push_multi(&self, sets: Vec<ResultSet>) {
        self.lock().responses.push_back(Response::Multi(sets));
    }

    /// The next statement fails with this error.
    pub fn push_error(&self, err: DbError) {
        self.lock().responses.push_back(Response::Error(err));
    }

    fn record(&self, sql: &str) -> Option<Response> {
        let mut shared = self.lock();
        shared.statements.push(sql.to_string());
        shared.responses.pop_front()
    }
}

pub struct RecordingDriver {
    recorder: Recorder,
    timer: Arc<dyn QueryTimer>,
    connected: bool,
    mode: QueryMode,
    tx: TransactionState,
    generation: Arc<AtomicU64>,
    insert_id: u64,
    affected_rows: u64,
    last_error: Option<BackendError>,
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            recorder: Recorder::default(),
            timer: Arc::new(TracingTimer),
            connected: false,
            mode: QueryMode::Store,
            tx: TransactionState::default(),
            generation: Arc::new(AtomicU64::new(0)),
            insert_id: 0,
            affected_rows: 0,
            last_error: None,
        }
    }

    pub fn with_timer(mut self, timer: Arc<dyn QueryTimer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_query_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    fn ensure_connected(&self) -> DbResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(DbError::NotConnected)
        }
    }

    /// Record one round-trip and take its queued response.
    fn round_trip(&mut self, sql: &str) -> DbResult<Vec<ResultSet>> {
        tracing::debug!(sql, "recording statement");
        let timer = Arc::clone(&self.timer);
        let response = measure(timer.as_ref(), sql, TimingCategory::Query, || {
            self.recorder.record(sql)
        });
        match response {
            None => Ok(vec![ResultSet::empty(0, 0)]),
            Some(Response::Result(rs)) => Ok(vec![rs]),
            Some(Response::Multi(sets)) => Ok(sets),
            Some(Response::Error(err)) => {
                if let DbError::Query { code, message, .. } = &err {
                    self.last_error = Some(BackendError {
                        code: *code,
                        message: message.clone(),
                    });
                }
                if err.is_connection() {
                    self.connected = false;
                    self.tx.clear();
                }
                Err(err)
            }
        }
    }

    fn control(&mut self, sql: &str) -> DbResult<()> {
        self.round_trip(sql).map(drop)
    }

    fn prepare(&mut self, sql: &str) -> DbResult<()> {
        self.ensure_connected()?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.tx.needs_begin(sql) {
            self.control("BEGIN")?;
            self.tx.mark_started();
            tracing::debug!("transaction started");
        }
        Ok(())
    }

    fn track(&mut self, rs: &ResultSet) {
        self.last_error = None;
        self.affected_rows = rs.affected_rows();
        // Any statement without a result set replaces the id, 0 included.
        if rs.field_count() == 0 {
            self.insert_id = rs.insert_id();
        }
    }

    /// Replay a buffered set through the streaming path.
    fn into_stream(mut rs: ResultSet) -> DbResult<ResultSet> {
        let (affected, insert_id) = (rs.affected_rows(), rs.insert_id());
        let rows = rs.fetch_all()?;
        let (tx, rx) = mpsc::channel(rows.len() + 1);
        for row in rows {
            let _ = tx.try_send(StreamItem::Row(row));
        }
        let _ = tx.try_send(StreamItem::Done {
            affected,
            insert_id,
        });
        drop(tx);
        ResultSet::open_stream(rx)
    }
}

impl Driver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn dialect(&self) -> Dialect {
        Dialect::MYSQL
    }

    fn connect(&mut self) -> DbResult<()> {
        if self.connected {
            return Ok(());
        }
        measure(self.timer.as_ref(), "connect", TimingCategory::Connect, || ());
        self.connected = true;
        tracing::info!(driver = self.name(), "connected");
        Ok(())
    }

    fn disconnect(&mut self) -> DbResult<()> {
        if !self.connected {
            return Ok(());
        }
        measure(
            self.timer.as_ref(),
            "disconnect",
            TimingCategory::Disconnect,
            || (),
        );
        self.connected = false;
        self.tx.reset();
        tracing::info!(driver = self.name(), "disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn ping(&mut self) -> DbResult<bool> {
        Ok(self.connected)
    }

    fn query_mode(&self) -> QueryMode {
        self.mode
    }

    fn set_query_mode(&mut self, mode: QueryMode) {
        self.mode = mode;
    }

    fn execute(&mut self, sql: &str) -> DbResult<ResultSet> {
        self.prepare(sql)?;
        let mut sets = self.round_trip(sql)?;
        let rs = if sets.is_empty() {
            ResultSet::empty(0, 0)
        } else {
            sets.swap_remove(0)
        };
        self.track(&rs);
        let rs = match self.mode {
            QueryMode::Use if rs.field_count() > 0 => Self::into_stream(rs)?,
            _ => rs,
        };
        Ok(rs.stamped(&self.generation))
    }

    fn execute_multi(&mut self, sql: &str) -> DbResult<MultiResult> {
        self.prepare(sql)?;
        let sets = self.round_trip(sql)?;
        if let Some(last) = sets.last() {
            self.track(last);
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
        self.ensure_connected()?;
        self.control("COMMIT")?;
        self.tx.clear();
        tracing::debug!("transaction committed");
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.tx.clear();
        if self.connected {
            self.control("ROLLBACK")?;
            tracing::debug!("transaction rolled back");
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
