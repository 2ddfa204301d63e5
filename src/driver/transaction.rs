//! Lazy-BEGIN transaction state.
//!
//! `tran_start` only arms the controller. The real `BEGIN` is sent right
//! before the first statement that is not exempt (see [`is_exempt`]).

/// Armed/started flags of one connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionState {
    armed: bool,
    started: bool,
}

impl TransactionState {
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Clear the armed flag; an open transaction stays open.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn in_transaction(&self) -> bool {
        self.started
    }

    /// True when `sql` must be preceded by `BEGIN`.
    pub fn needs_begin(&self, sql: &str) -> bool {
        self.armed && !self.started && !is_exempt(sql)
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    /// Forget the open transaction after COMMIT/ROLLBACK or a lost connection.
    pub fn clear(&mut self) {
        self.started = false;
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Statements that never open a transaction: plain SELECT, SET, FLUSH and
/// transaction control itself. A locking SELECT is not exempt.
pub fn is_exempt(sql: &str) -> bool {
    let keyword = leading_keyword(sql);
    match keyword.as_str() {
        "SELECT" => !is_locking_read(sql),
        "SET" | "FLUSH" | "BEGIN" | "START" | "COMMIT" | "ROLLBACK" => true,
        _ => false,
    }
}

/// True for statements that answer with a result set even when it has no rows.
pub fn returns_rows(sql: &str) -> bool {
    matches!(
        leading_keyword(sql).as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH"
    )
}

fn leading_keyword(sql: &str) -> String {
    sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn is_locking_read(sql: &str) -> bool {
    let tail = sql
        .trim_end_matches(|c: char| c.is_whitespace() || c == ';')
        .to_ascii_uppercase();
    tail.ends_with("FOR UPDATE") || tail.ends_with("LOCK IN SHARE MODE")
}
