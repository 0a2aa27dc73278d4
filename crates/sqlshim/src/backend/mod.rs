//! The engine seam behind [`Connection`](crate::Connection).
//!
//! A [`Backend`] prepares and executes statements; a [`PreparedStatement`]
//! owns a materialized result set and hands out one row at a time. The
//! statement layer above only ever asks for the current row's column lengths
//! and for a column decoded as an integer or into a caller-shaped byte buffer.

pub mod postgres;

use crate::bind::ParamValue;
use crate::error::Result;

pub use postgres::{PgBackend, PgStatement};

/// Result column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Longest value in the stored result, once computed.
    pub max_length: Option<usize>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_length: None,
        }
    }
}

/// A statement prepared on a backend.
pub trait PreparedStatement {
    /// Number of placeholders.
    fn param_count(&self) -> usize;

    /// Result columns, or `None` for statements that produce no rows.
    fn columns(&self) -> Option<&[ColumnMeta]>;

    /// Ask for per-column maximum lengths to be computed when the result is stored.
    fn update_max_length(&mut self, enabled: bool);

    /// Advance to the next stored row. `Ok(false)` means there are no more rows.
    fn fetch(&mut self) -> Result<bool>;

    /// Byte length of a column in the current row. `None` for NULL, no
    /// current row, or an out-of-range index.
    fn column_length(&self, index: usize) -> Option<usize>;

    /// Decode a column of the current row as an integer. `Ok(None)` for NULL.
    fn read_integer(&self, index: usize) -> Result<Option<i64>>;

    /// Copy a column of the current row into `buf` as a byte string.
    ///
    /// Copies at most `buf.len()` bytes and returns the full value length,
    /// or `Ok(None)` for NULL.
    fn read_text(&self, index: usize, buf: &mut [u8]) -> Result<Option<usize>>;
}

/// One session on a database engine.
pub trait Backend {
    type Statement: PreparedStatement;

    fn prepare(&mut self, sql: &str) -> Result<Self::Statement>;

    /// Bind `params` (one per placeholder) and execute.
    fn execute(&mut self, stmt: &mut Self::Statement, params: &[ParamValue]) -> Result<()>;

    /// Materialize the result of the last execution. Returns the row count.
    fn store_result(&mut self, stmt: &mut Self::Statement) -> Result<u64>;

    /// Release a prepared statement.
    fn close_statement(&mut self, stmt: Self::Statement) -> Result<()>;

    /// End the session.
    fn close(&mut self) -> Result<()>;
}
