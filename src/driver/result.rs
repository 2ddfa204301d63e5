//! Result handles.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value as Json};
use tokio::sync::mpsc;

use crate::error::{DbError, DbResult};

/// One row: shared column names plus JSON cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Json>,
}

impl Record {
    pub fn new(columns: Arc<[String]>, values: Vec<Json>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&Json> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    pub fn get_index(&self, index: usize) -> Option<&Json> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Json] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Json> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column-keyed map; a repeated column name keeps the last cell.
    pub fn to_map(&self) -> Map<String, Json> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// Message from a streaming reader.
#[derive(Debug)]
pub enum StreamItem {
    Row(Record),
    Done { affected: u64, insert_id: u64 },
    Error(DbError),
}

enum Rows {
    Buffered(VecDeque<Record>),
    Streaming {
        rx: mpsc::Receiver<StreamItem>,
        pending: Option<Record>,
        finished: bool,
    },
}

/// Handle over the rows of one executed statement.
///
/// Buffered handles hold every row client-side ("store" mode). Streaming
/// handles pull rows from the connection as they are fetched ("use" mode)
/// and stop yielding once a newer statement runs on the same driver.
/// Dropping the handle releases it.
pub struct ResultSet {
    rows: Rows,
    columns: Arc<[String]>,
    total: Option<u64>,
    affected_rows: u64,
    insert_id: u64,
    generation: u64,
    current: Option<Arc<AtomicU64>>,
}

impl ResultSet {
    /// Result of a statement without rows.
    pub fn empty(affected_rows: u64, insert_id: u64) -> Self {
        Self::build(Rows::Buffered(VecDeque::new()), Arc::from(Vec::new()), Some(0))
            .with_counts(affected_rows, insert_id)
    }

    fn build(rows: Rows, columns: Arc<[String]>, total: Option<u64>) -> Self {
        Self {
            rows,
            columns,
            total,
            affected_rows: 0,
            insert_id: 0,
            generation: 0,
            current: None,
        }
    }

    pub fn buffered(columns: Arc<[String]>, rows: Vec<Vec<Json>>) -> Self {
        let total = rows.len() as u64;
        let records = rows
            .into_iter()
            .map(|values| Record::new(Arc::clone(&columns), values))
            .collect();
        Self::build(Rows::Buffered(records), columns, Some(total))
    }

    /// Build a buffered set from column names and rows of JSON cells.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Json>>,
    ) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self::buffered(Arc::from(columns), rows)
    }

    /// Wait for the first message of a streaming reader.
    ///
    /// A backend error is returned here rather than on the first fetch.
    pub fn open_stream(mut rx: mpsc::Receiver<StreamItem>) -> DbResult<Self> {
        match rx.blocking_recv() {
            None => Ok(Self::empty(0, 0)),
            Some(StreamItem::Error(err)) => Err(err),
            Some(StreamItem::Done {
                affected,
                insert_id,
            }) => Ok(Self::empty(affected, insert_id)),
            Some(StreamItem::Row(first)) => {
                let columns = Arc::clone(&first.columns);
                let rows = Rows::Streaming {
                    rx,
                    pending: Some(first),
                    finished: false,
                };
                Ok(Self::build(rows, columns, None))
            }
        }
    }

    pub fn with_counts(mut self, affected_rows: u64, insert_id: u64) -> Self {
        self.affected_rows = affected_rows;
        self.insert_id = insert_id;
        self
    }

    /// Stamp with the driver's current generation.
    pub(crate) fn stamped(mut self, counter: &Arc<AtomicU64>) -> Self {
        self.generation = counter.load(Ordering::SeqCst);
        self.current = Some(Arc::clone(counter));
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once a newer statement has run on the owning driver.
    pub fn is_current(&self) -> bool {
        match &self.current {
            Some(counter) => counter.load(Ordering::SeqCst) == self.generation,
            None => true,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.rows, Rows::Streaming { .. })
    }

    /// Next row keyed by column name.
    pub fn fetch(&mut self) -> DbResult<Option<Record>> {
        let stale = !self.is_current();
        match &mut self.rows {
            Rows::Buffered(rows) => Ok(rows.pop_front()),
            Rows::Streaming {
                rx,
                pending,
                finished,
            } => {
                if stale || *finished {
                    return Ok(None);
                }
                if let Some(row) = pending.take() {
                    return Ok(Some(row));
                }
                match rx.blocking_recv() {
                    Some(StreamItem::Row(row)) => Ok(Some(row)),
                    Some(StreamItem::Done {
                        affected,
                        insert_id,
                    }) => {
                        *finished = true;
                        self.affected_rows = affected;
                        self.insert_id = insert_id;
                        Ok(None)
                    }
                    Some(StreamItem::Error(err)) => {
                        *finished = true;
                        Err(err)
                    }
                    None => {
                        *finished = true;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Next row as positional cells.
    pub fn fetch_row(&mut self) -> DbResult<Option<Vec<Json>>> {
        Ok(self.fetch()?.map(Record::into_values))
    }

    pub fn fetch_all(&mut self) -> DbResult<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(row) = self.fetch()? {
            out.push(row);
        }
        Ok(out)
    }

    /// Row count, known for buffered sets only.
    pub fn num_rows(&self) -> Option<u64> {
        self.total
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    pub fn field_names(&self) -> &[String] {
        &self.columns
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn insert_id(&self) -> u64 {
        self.insert_id
    }

    /// Release the handle now.
    pub fn free(self) {}
}

impl Iterator for ResultSet {
    type Item = DbResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch().transpose()
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        if let Rows::Streaming { rx, .. } = &mut self.rows {
            rx.close();
        }
        tracing::trace!(generation = self.generation, "result set released");
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .field("streaming", &self.is_streaming())
            .field("num_rows", &self.total)
            .field("affected_rows", &self.affected_rows)
            .field("insert_id", &self.insert_id)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Cursor over the result sets of a multi-result statement.
#[derive(Debug, Default)]
pub struct MultiResult {
    sets: VecDeque<ResultSet>,
}

impl MultiResult {
    pub fn new(sets: Vec<ResultSet>) -> Self {
        Self { sets: sets.into() }
    }

    /// Advance to the next result set.
    pub fn next_result(&mut self) -> Option<ResultSet> {
        self.sets.pop_front()
    }

    /// Discard every remaining result set.
    pub fn clear(&mut self) {
        self.sets.clear();
    }

    pub fn remaining(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
