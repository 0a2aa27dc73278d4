//! Connection handles.

use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;

use tracing::{debug, error, info};

use crate::backend::{Backend, PgBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::splitter;
use crate::statement::{StepResult, Statement};

/// One session on a backend engine.
///
/// Statements borrow the connection, so it cannot be closed (or moved) while
/// any of them is alive. The connection is not `Sync`: one thread drives it.
pub struct Connection<B: Backend = PgBackend> {
    backend: RefCell<B>,
}

impl Connection<PgBackend> {
    /// Open the database described by a JSON config file.
    ///
    /// The configured database is created if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading connection config");
        let config = Config::load(path)?;
        Self::open_with_config(&config)
    }

    pub fn open_with_config(config: &Config) -> Result<Self> {
        let pg = config.to_pg_config();
        let backend = PgBackend::connect(&pg)?;
        info!(host = %pg.host, port = pg.port, database = %pg.database, "connected");
        Ok(Self::with_backend(backend))
    }
}

impl<B: Backend> Connection<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: RefCell::new(backend),
        }
    }

    /// Prepare the first statement in `sql`.
    ///
    /// Returns the handle and the text after the consumed statement, or
    /// `None` when nothing is left.
    pub fn prepare<'c, 's>(&'c self, sql: &'s str) -> (Statement<'c, B>, Option<&'s str>) {
        self.prepare_with_limit(sql, None)
    }

    /// Like [`prepare`](Self::prepare), reading at most `max_len` bytes of `sql`.
    pub fn prepare_with_limit<'c, 's>(
        &'c self,
        sql: &'s str,
        max_len: Option<usize>,
    ) -> (Statement<'c, B>, Option<&'s str>) {
        let (stmt, rest) = splitter::split_first(sql, max_len);
        (Statement::prepare(self, stmt.to_string()), rest)
    }

    /// Like [`prepare_with_limit`](Self::prepare_with_limit) for raw bytes.
    ///
    /// Only the first statement has to be valid UTF-8. If it is not, the
    /// returned handle is unprepared and its first step reports ERROR; the
    /// remainder is still split off so later statements stay reachable.
    pub fn prepare_bytes<'c, 's>(
        &'c self,
        sql: &'s [u8],
        max_len: Option<usize>,
    ) -> (Statement<'c, B>, Option<&'s [u8]>) {
        let (stmt, rest) = splitter::split_first_bytes(sql, max_len);
        let stmt = match std::str::from_utf8(stmt) {
            Ok(text) => Statement::prepare(self, text.trim().to_string()),
            Err(e) => {
                let text = String::from_utf8_lossy(stmt).trim().to_string();
                error!(sql = %text, error = %e, "prepare failed: SQL text is not valid UTF-8");
                Statement::unprepared(self, text)
            }
        };
        (stmt, rest)
    }

    /// Run every statement in `sql`, discarding rows.
    ///
    /// Stops at the first statement that fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        for text in splitter::split_statements(sql) {
            let (mut stmt, _) = self.prepare(text);
            while stmt.try_step()? {}
            stmt.finalize()?;
        }
        Ok(())
    }

    /// Prepare and step a single statement, returning its final signal.
    pub fn execute(&self, sql: &str) -> StepResult {
        let (mut stmt, _) = self.prepare(sql);
        loop {
            match stmt.step() {
                StepResult::Row => continue,
                done => return done,
            }
        }
    }

    /// Borrow the backend, e.g. to inspect session state.
    pub fn backend(&self) -> Ref<'_, B> {
        self.backend.borrow()
    }

    pub(crate) fn backend_mut(&self) -> Result<RefMut<'_, B>> {
        self.backend
            .try_borrow_mut()
            .map_err(|_| Error::Backend("connection is busy".to_string()))
    }

    /// Close the session.
    pub fn close(self) -> Result<()> {
        let mut backend = self.backend.into_inner();
        backend.close()?;
        debug!("connection closed");
        Ok(())
    }
}
