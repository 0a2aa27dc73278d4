//! # sqlshim-pg
//!
//! A small, blocking PostgreSQL client used as the backend engine behind the
//! `sqlshim` statement API.
//!
//! ## Features
//! - **Blocking I/O**: one `TcpStream` per connection, no runtime required.
//! - **Authentication**: cleartext, MD5 and SCRAM-SHA-256.
//! - **Extended Query Protocol**: named Parse/Describe, Bind/Execute, Close.
//! - **Materialized results**: every execution returns its full row set.

pub mod auth;
pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod row;
pub mod types;

pub use codec::ColumnDesc;
pub use connection::{Execution, PgConfig, PgConnection, PreparedDesc};
pub use error::{PgError, PgResult};
pub use row::Row;
