//! Prepared statement handles and their cursor.

use std::ffi::CStr;

use tracing::{debug, error, trace};

use crate::backend::{Backend, PgBackend, PreparedStatement};
use crate::bind::{ParamValue, Params, text_length};
use crate::column::ColumnSlot;
use crate::connection::Connection;
use crate::error::{Error, Result};

/// Outcome of one cursor advance, with SQLite's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StepResult {
    /// A row is ready to be read.
    Row = 100,
    /// The statement has finished.
    Done = 101,
    /// Execution failed. Details went to the log.
    Error = 1,
}

impl StepResult {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Execution state of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Unexecuted,
    Executing,
    Exhausted,
    Failed,
}

/// One prepared SQL statement plus its execution cursor.
///
/// Created by [`Connection::prepare`]. A handle always exists, even when the
/// backend rejected the SQL; the failure is then reported by the first
/// [`step`](Statement::step).
pub struct Statement<'c, B: Backend = PgBackend> {
    conn: &'c Connection<B>,
    sql: String,
    prepared: Option<B::Statement>,
    params: Params,
    columns: Vec<ColumnSlot>,
    names: Vec<String>,
    state: ExecState,
    rows_returned: u64,
    total_rows: u64,
    on_row: bool,
}

impl<'c, B: Backend> Statement<'c, B> {
    /// A handle the backend never saw. Every step reports ERROR.
    pub(crate) fn unprepared(conn: &'c Connection<B>, sql: String) -> Self {
        Self {
            conn,
            sql,
            prepared: None,
            params: Params::default(),
            columns: Vec::new(),
            names: Vec::new(),
            state: ExecState::Unexecuted,
            rows_returned: 0,
            total_rows: 0,
            on_row: false,
        }
    }

    pub(crate) fn prepare(conn: &'c Connection<B>, sql: String) -> Self {
        let mut stmt = Self::unprepared(conn, sql);
        // SQL travels as a NUL-terminated string on the wire
        if stmt.sql.contains('\0') {
            error!(sql = %stmt.sql.escape_debug(), "prepare failed: SQL text contains a NUL byte");
            return stmt;
        }

        let prepared = conn
            .backend_mut()
            .and_then(|mut backend| backend.prepare(&stmt.sql));
        match prepared {
            Ok(mut prepared) => {
                stmt.params = Params::new(prepared.param_count());
                if let Some(columns) = prepared.columns() {
                    stmt.names = columns.iter().map(|c| c.name.clone()).collect();
                }
                if !stmt.names.is_empty() {
                    stmt.columns = vec![ColumnSlot::default(); stmt.names.len()];
                    prepared.update_max_length(true);
                }
                trace!(
                    sql = %stmt.sql,
                    params = stmt.params.len(),
                    columns = stmt.columns.len(),
                    "statement ready"
                );
                stmt.prepared = Some(prepared);
            }
            Err(e) => error!(sql = %stmt.sql, error = %e, "prepare failed"),
        }
        stmt
    }

    /// The statement text sent to the backend.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the backend accepted the statement.
    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    /// Rows handed out so far.
    pub fn rows_returned(&self) -> u64 {
        self.rows_returned
    }

    pub fn bind_parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    // ─── Binding ──────────────────────────────────────────────

    /// Bind SQL NULL. Out-of-range indices are ignored.
    pub fn bind_null(&mut self, index: usize) {
        self.params.set(index, ParamValue::Null);
    }

    pub fn bind_int(&mut self, index: usize, value: i32) {
        self.params.set(index, ParamValue::Integer(value.into()));
    }

    pub fn bind_int64(&mut self, index: usize, value: i64) {
        self.params.set(index, ParamValue::Integer(value));
    }

    /// Bind text. `len` of `None` stops at the first NUL byte.
    pub fn bind_text(&mut self, index: usize, value: &[u8], len: Option<usize>) {
        self.bind_text_with(index, value, len, |_| {});
    }

    /// Bind text, then hand the caller's buffer to `dispose` once it has been
    /// copied. `dispose` is not called for an out-of-range index.
    pub fn bind_text_with<F>(&mut self, index: usize, value: &[u8], len: Option<usize>, dispose: F)
    where
        F: FnOnce(&[u8]),
    {
        let n = text_length(value, len);
        if self.params.set(index, ParamValue::Text(value[..n].to_vec())) {
            dispose(value);
        }
    }

    /// The value currently bound at `index`.
    pub fn bound(&self, index: usize) -> Option<&ParamValue> {
        self.params.get(index)
    }

    // ─── Cursor ───────────────────────────────────────────────

    /// Advance the cursor: execute on the first call, then hand out one row
    /// per call.
    pub fn step(&mut self) -> StepResult {
        match self.try_step() {
            Ok(true) => StepResult::Row,
            Ok(false) => StepResult::Done,
            Err(e) => {
                error!(sql = %self.sql, error = %e, "step failed");
                StepResult::Error
            }
        }
    }

    /// Advance the cursor. `Ok(true)` means a row is ready, `Ok(false)` that
    /// the statement is done.
    pub fn try_step(&mut self) -> Result<bool> {
        if self.prepared.is_none() {
            return Err(Error::NotPrepared {
                sql: self.sql.clone(),
            });
        }

        match self.state {
            ExecState::Failed => return Err(Error::StatementFailed),
            ExecState::Exhausted => return Ok(false),
            ExecState::Unexecuted => {
                if let Err(e) = self.execute() {
                    self.state = ExecState::Failed;
                    return Err(e);
                }
            }
            ExecState::Executing => {}
        }

        if self.columns.is_empty() || self.rows_returned >= self.total_rows {
            self.finish();
            return Ok(false);
        }
        self.fetch_row()
    }

    fn execute(&mut self) -> Result<()> {
        let Some(prepared) = self.prepared.as_mut() else {
            return Err(Error::NotPrepared {
                sql: self.sql.clone(),
            });
        };
        let mut backend = self.conn.backend_mut()?;
        backend.execute(prepared, self.params.as_slice())?;
        if !self.columns.is_empty() {
            self.total_rows = backend.store_result(prepared)?;
        }
        self.state = ExecState::Executing;
        debug!(sql = %self.sql, rows = self.total_rows, "executed");
        Ok(())
    }

    fn fetch_row(&mut self) -> Result<bool> {
        let Some(prepared) = self.prepared.as_mut() else {
            return Ok(false);
        };
        match prepared.fetch() {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    sql = %self.sql,
                    returned = self.rows_returned,
                    expected = self.total_rows,
                    "result ended early"
                );
                self.total_rows = self.rows_returned;
                self.finish();
                return Ok(false);
            }
            Err(e) => debug!(sql = %self.sql, error = %e, "fetch anomaly tolerated"),
        }

        self.rows_returned += 1;
        self.on_row = true;
        for (i, slot) in self.columns.iter_mut().enumerate() {
            slot.refresh_length(prepared.column_length(i));
        }
        Ok(true)
    }

    fn finish(&mut self) {
        self.state = ExecState::Exhausted;
        self.on_row = false;
        for slot in &mut self.columns {
            slot.clear_row();
        }
    }

    // ─── Columns ──────────────────────────────────────────────

    /// Column `index` of the current row as a 32-bit integer.
    ///
    /// NULL, no current row, and out-of-range indices all read as 0.
    pub fn column_int(&mut self, index: usize) -> i32 {
        self.column_int64(index) as i32
    }

    /// Column `index` of the current row as a 64-bit integer.
    pub fn column_int64(&mut self, index: usize) -> i64 {
        match self.try_column_int64(index) {
            Ok(v) => v,
            Err(e) => {
                debug!(index, error = %e, "column_int64 read as 0");
                0
            }
        }
    }

    /// Column `index` of the current row as a NUL-terminated byte string.
    ///
    /// NULL, no current row, and out-of-range indices all read as `None`. The
    /// returned string lives until the next access to this statement.
    pub fn column_text(&mut self, index: usize) -> Option<&CStr> {
        match self.try_column_text(index) {
            Ok(text) => text,
            Err(e) => {
                debug!(index, error = %e, "column_text read as NULL");
                None
            }
        }
    }

    pub fn try_column_int64(&mut self, index: usize) -> Result<i64> {
        let (prepared, slot, on_row) = self.column_parts(index)?;
        if !on_row {
            return Ok(0);
        }
        slot.decode_integer(prepared, index)
    }

    pub fn try_column_text(&mut self, index: usize) -> Result<Option<&CStr>> {
        let (prepared, slot, on_row) = self.column_parts(index)?;
        if !on_row {
            return Ok(None);
        }
        slot.decode_text(prepared, index)
    }

    /// Like [`try_column_text`](Self::try_column_text), checked for UTF-8.
    pub fn try_column_str(&mut self, index: usize) -> Result<Option<&str>> {
        match self.try_column_text(index)? {
            Some(text) => text.to_str().map(Some).map_err(|_| Error::Utf8),
            None => Ok(None),
        }
    }

    fn column_parts(&mut self, index: usize) -> Result<(&B::Statement, &mut ColumnSlot, bool)> {
        let count = self.columns.len();
        let prepared = self.prepared.as_ref().ok_or_else(|| Error::NotPrepared {
            sql: self.sql.clone(),
        })?;
        let slot = self
            .columns
            .get_mut(index)
            .ok_or(Error::ColumnRange { index, count })?;
        Ok((prepared, slot, self.on_row))
    }

    // ─── Teardown ─────────────────────────────────────────────

    /// Release the statement and everything it owns.
    ///
    /// Dropping a statement does the same, ignoring errors.
    pub fn finalize(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let sql = std::mem::take(&mut self.sql);
        let prepared = self.prepared.take();
        self.params.clear();
        self.columns.clear();
        self.names.clear();

        let Some(prepared) = prepared else {
            return Ok(());
        };
        trace!(%sql, "finalizing");
        self.conn.backend_mut()?.close_statement(prepared)
    }
}

impl<B: Backend> Drop for Statement<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            debug!(error = %e, "releasing statement on drop failed");
        }
    }
}

impl<B: Backend> std::fmt::Debug for Statement<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("prepared", &self.prepared.is_some())
            .field("params", &self.params.len())
            .field("columns", &self.names)
            .field("state", &self.state)
            .field("rows_returned", &self.rows_returned)
            .finish()
    }
}
