//! An in-memory scripted backend for exercising the statement layer without
//! a database server.
//!
//! Each SQL text is registered with a [`Script`] describing how the backend
//! reacts to it. Values are stored in text form, the way PostgreSQL returns them.
//!
//! ```rust
//! use sqlshim::testing::ScriptedBackend;
//! use sqlshim::{Connection, StepResult};
//!
//! let backend = ScriptedBackend::new()
//!     .command("CREATE TABLE t(a INT)")
//!     .insert("INSERT INTO t VALUES($1)", "t", 1)
//!     .select("SELECT a FROM t", "t", &["a"]);
//! let conn = Connection::with_backend(backend);
//!
//! conn.execute_batch("CREATE TABLE t(a INT)").unwrap();
//! let (mut insert, _) = conn.prepare("INSERT INTO t VALUES($1)");
//! insert.bind_int(0, 42);
//! assert_eq!(insert.step(), StepResult::Done);
//! drop(insert);
//!
//! let (mut select, _) = conn.prepare("SELECT a FROM t");
//! assert_eq!(select.step(), StepResult::Row);
//! assert_eq!(select.column_int(0), 42);
//! assert_eq!(select.step(), StepResult::Done);
//! ```

use std::collections::HashMap;

use sqlshim_pg::Row;
use sqlshim_pg::types::{self, oid};

use crate::backend::{Backend, ColumnMeta, PreparedStatement};
use crate::bind::ParamValue;
use crate::error::{Error, Result};

/// How the scripted backend answers one SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Succeeds and produces no columns.
    Command,
    /// Appends its bound parameters as one row of `table`.
    Insert { table: String, params: usize },
    /// Returns every row of `table`.
    Select { table: String, columns: Vec<String> },
    /// Returns a fixed result set.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Option<Vec<u8>>>>,
    },
    /// Rejected at prepare time.
    FailPrepare,
    /// Prepares, then fails to execute.
    FailExecute,
}

/// Scripted [`Backend`] implementation.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: HashMap<String, Script>,
    tables: HashMap<String, Vec<Vec<Option<Vec<u8>>>>>,
    executed: Vec<String>,
    prepared: usize,
    released: usize,
    closed: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, sql: &str, script: Script) -> Self {
        self.scripts.insert(sql.to_string(), script);
        self
    }

    pub fn command(self, sql: &str) -> Self {
        self.script(sql, Script::Command)
    }

    pub fn insert(self, sql: &str, table: &str, params: usize) -> Self {
        self.script(
            sql,
            Script::Insert {
                table: table.to_string(),
                params,
            },
        )
    }

    pub fn select(self, sql: &str, table: &str, columns: &[&str]) -> Self {
        self.script(
            sql,
            Script::Select {
                table: table.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
            },
        )
    }

    pub fn rows(self, sql: &str, columns: &[&str], rows: &[&[Option<&str>]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| v.map(|s| s.as_bytes().to_vec())).collect())
            .collect();
        self.script(
            sql,
            Script::Rows {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
            },
        )
    }

    pub fn fail_prepare(self, sql: &str) -> Self {
        self.script(sql, Script::FailPrepare)
    }

    pub fn fail_execute(self, sql: &str) -> Self {
        self.script(sql, Script::FailExecute)
    }

    /// SQL texts executed so far, in order.
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Stored rows of a table filled by [`Script::Insert`].
    pub fn table(&self, name: &str) -> Option<&[Vec<Option<Vec<u8>>>]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    /// Statements prepared but not yet released.
    pub fn open_statements(&self) -> usize {
        self.prepared - self.released
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A statement prepared by [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedStatement {
    sql: String,
    script: Script,
    columns: Option<Vec<ColumnMeta>>,
    compute_max_length: bool,
    pending: Option<Vec<Row>>,
    rows: Vec<Row>,
    current: Option<usize>,
    next: usize,
}

impl ScriptedStatement {
    fn current_row(&self) -> Result<&Row> {
        self.current
            .and_then(|i| self.rows.get(i))
            .ok_or_else(|| Error::Backend("no current row".to_string()))
    }
}

impl PreparedStatement for ScriptedStatement {
    fn param_count(&self) -> usize {
        match &self.script {
            Script::Insert { params, .. } => *params,
            _ => 0,
        }
    }

    fn columns(&self) -> Option<&[ColumnMeta]> {
        self.columns.as_deref()
    }

    fn update_max_length(&mut self, enabled: bool) {
        self.compute_max_length = enabled;
    }

    fn fetch(&mut self) -> Result<bool> {
        if self.next >= self.rows.len() {
            self.current = None;
            return Ok(false);
        }
        self.current = Some(self.next);
        self.next += 1;
        Ok(true)
    }

    fn column_length(&self, index: usize) -> Option<usize> {
        self.current_row().ok()?.value_len(index)
    }

    fn read_integer(&self, index: usize) -> Result<Option<i64>> {
        let row = self.current_row()?;
        Ok(row.get(index).map(|data| types::text_to_integer(oid::TEXT, data)))
    }

    fn read_text(&self, index: usize, buf: &mut [u8]) -> Result<Option<usize>> {
        let row = self.current_row()?;
        Ok(row.get(index).map(|data| {
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            data.len()
        }))
    }
}

impl Backend for ScriptedBackend {
    type Statement = ScriptedStatement;

    fn prepare(&mut self, sql: &str) -> Result<ScriptedStatement> {
        if self.closed {
            return Err(Error::Backend("session closed".to_string()));
        }
        let script = self
            .scripts
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::Backend(format!("no script for {sql:?}")))?;
        let columns = match &script {
            Script::FailPrepare => {
                return Err(Error::Backend(format!("syntax error in {sql:?}")));
            }
            Script::Select { columns, .. } | Script::Rows { columns, .. } => {
                Some(columns.iter().map(ColumnMeta::new).collect())
            }
            _ => None,
        };
        self.prepared += 1;
        Ok(ScriptedStatement {
            sql: sql.to_string(),
            script,
            columns,
            compute_max_length: false,
            pending: None,
            rows: Vec::new(),
            current: None,
            next: 0,
        })
    }

    fn execute(&mut self, stmt: &mut ScriptedStatement, params: &[ParamValue]) -> Result<()> {
        self.executed.push(stmt.sql.clone());
        let rows = match &stmt.script {
            Script::Command => Vec::new(),
            Script::Insert { table, .. } => {
                let row = params
                    .iter()
                    .map(|p| p.to_text().map(|t| t.into_owned()))
                    .collect();
                self.tables.entry(table.clone()).or_default().push(row);
                Vec::new()
            }
            Script::Select { table, .. } => self
                .tables
                .get(table)
                .map(|rows| rows.iter().cloned().map(Row::from).collect())
                .unwrap_or_default(),
            Script::Rows { rows, .. } => rows.iter().cloned().map(Row::from).collect(),
            Script::FailPrepare | Script::FailExecute => {
                return Err(Error::Backend(format!("execution of {:?} failed", stmt.sql)));
            }
        };
        stmt.pending = Some(rows);
        stmt.current = None;
        stmt.next = 0;
        Ok(())
    }

    fn store_result(&mut self, stmt: &mut ScriptedStatement) -> Result<u64> {
        let rows = stmt
            .pending
            .take()
            .ok_or_else(|| Error::Backend("statement has not been executed".to_string()))?;
        if stmt.compute_max_length
            && let Some(columns) = stmt.columns.as_mut()
        {
            for (i, column) in columns.iter_mut().enumerate() {
                column.max_length = rows.iter().filter_map(|r| r.value_len(i)).max();
            }
        }
        stmt.rows = rows;
        Ok(stmt.rows.len() as u64)
    }

    fn close_statement(&mut self, _stmt: ScriptedStatement) -> Result<()> {
        self.released += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
