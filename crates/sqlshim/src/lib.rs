//! # sqlshim
//!
//! Run code written against SQLite's statement API on PostgreSQL.
//!
//! The crate reproduces the embedded cursor contract on top of a
//! client/server engine: multi-statement buffers are split one statement at a
//! time, each statement is prepared on the server, parameters are bound by
//! 0-based index, and `step` hands out one row per call while columns are
//! re-read in whatever representation the caller asks for.
//!
//! ```rust,no_run
//! use sqlshim::{Connection, StepResult};
//!
//! let conn = Connection::open("cars.json")?;
//! conn.execute_batch("CREATE TABLE IF NOT EXISTS Cars(Id INT, Name TEXT, Price INT)")?;
//!
//! let (mut insert, _) = conn.prepare("INSERT INTO Cars VALUES($1, $2, $3)");
//! insert.bind_int(0, 2);
//! insert.bind_text(1, b"Mercedes", None);
//! insert.bind_int(2, 57127);
//! assert_eq!(insert.step(), StepResult::Done);
//! insert.finalize()?;
//!
//! let (mut select, _) = conn.prepare("SELECT Id, Name FROM Cars ORDER BY Id");
//! while select.step() == StepResult::Row {
//!     let id = select.column_int(0);
//!     let name = select.column_text(1).map(|n| n.to_string_lossy().into_owned());
//!     println!("{id} {name:?}");
//! }
//! select.finalize()?;
//! conn.close()?;
//! # Ok::<(), sqlshim::Error>(())
//! ```
//!
//! With the `capi` feature (on by default) the same API is exported as
//! `sqlite3_*` C symbols; see [`ffi`].

pub mod backend;
pub mod bind;
pub mod column;
pub mod config;
pub mod connection;
pub mod error;
#[cfg(feature = "capi")]
pub mod ffi;
pub mod logging;
pub mod splitter;
pub mod statement;
pub mod testing;

pub use backend::{Backend, ColumnMeta, PgBackend, PreparedStatement};
pub use bind::ParamValue;
pub use config::Config;
pub use connection::Connection;
pub use error::{Error, Result};
pub use splitter::{split_statements, statement_length};
pub use statement::{ExecState, Statement, StepResult};
