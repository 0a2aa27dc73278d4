//! C ABI exposing the statement API under SQLite's `sqlite3_*` names.
//!
//! Handles are boxed Rust objects handed out as raw pointers. A statement
//! borrows its connection for `'static`; the connection refuses to close
//! (`SQLITE_BUSY`) while statements are outstanding, and `sqlite3_close_v2`
//! defers the close until the last statement is finalized.
//!
//! The exported functions work on PostgreSQL handles. The handle logic
//! behind them is generic over [`Backend`], so it runs against
//! [`ScriptedBackend`](crate::testing::ScriptedBackend) in tests.
//!
//! Bind indices are 0-based. Every string passed in must be NUL-terminated.

use std::cell::Cell;
use std::ffi::{CStr, c_char, c_int, c_uchar, c_void};
use std::ptr;

use tracing::{debug, error};

use crate::backend::{Backend, PgBackend};
use crate::connection::Connection;
use crate::statement::Statement;

pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_CANTOPEN: c_int = 14;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

/// Destructor sentinel meaning "the buffer is static, do not call".
pub const SQLITE_STATIC: isize = 0;
/// Destructor sentinel meaning "copy the buffer"; never called either.
pub const SQLITE_TRANSIENT: isize = -1;

/// Opaque connection handle (`sqlite3*`).
pub struct Sqlite3<B: Backend = PgBackend> {
    conn: Connection<B>,
    open_statements: Cell<usize>,
    zombie: Cell<bool>,
}

impl<B: Backend> Sqlite3<B> {
    pub fn new(conn: Connection<B>) -> Self {
        Self {
            conn,
            open_statements: Cell::new(0),
            zombie: Cell::new(false),
        }
    }
}

/// Opaque statement handle (`sqlite3_stmt*`).
pub struct Sqlite3Stmt<B: Backend + 'static = PgBackend> {
    stmt: Statement<'static, B>,
    db: *mut Sqlite3<B>,
}

fn bind_index(index: c_int) -> Option<usize> {
    usize::try_from(index).ok()
}

// ─── Handle logic ─────────────────────────────────────────────

/// Close a connection handle that has no outstanding statements.
///
/// # Safety
/// `db` must come from `Box::into_raw` and must not be used afterwards.
unsafe fn destroy<B: Backend>(db: *mut Sqlite3<B>) -> c_int {
    let handle = unsafe { Box::from_raw(db) };
    match handle.conn.close() {
        Ok(()) => SQLITE_OK,
        Err(e) => {
            error!(error = %e, "close failed");
            SQLITE_ERROR
        }
    }
}

/// # Safety
/// `db` must be null or a live handle.
unsafe fn close_handle<B: Backend>(db: *mut Sqlite3<B>) -> c_int {
    let Some(handle) = (unsafe { db.as_ref() }) else {
        return SQLITE_OK;
    };
    let outstanding = handle.open_statements.get();
    if outstanding > 0 {
        debug!(outstanding, "close refused, statements still open");
        return SQLITE_BUSY;
    }
    unsafe { destroy(db) }
}

/// # Safety
/// `db` must be null or a live handle.
unsafe fn close_handle_v2<B: Backend>(db: *mut Sqlite3<B>) -> c_int {
    let Some(handle) = (unsafe { db.as_ref() }) else {
        return SQLITE_OK;
    };
    if handle.open_statements.get() > 0 {
        debug!(outstanding = handle.open_statements.get(), "close deferred");
        handle.zombie.set(true);
        return SQLITE_OK;
    }
    unsafe { destroy(db) }
}

/// # Safety
/// See [`sqlite3_prepare`].
unsafe fn prepare_handle<B: Backend + 'static>(
    db: *mut Sqlite3<B>,
    z_sql: *const c_char,
    n_byte: c_int,
    pp_stmt: *mut *mut Sqlite3Stmt<B>,
    pz_tail: *mut *const c_char,
) -> c_int {
    if pp_stmt.is_null() {
        return SQLITE_MISUSE;
    }
    unsafe { *pp_stmt = ptr::null_mut() };
    if !pz_tail.is_null() {
        unsafe { *pz_tail = ptr::null() };
    }
    if db.is_null() || z_sql.is_null() {
        return SQLITE_MISUSE;
    }

    let sql = unsafe { CStr::from_ptr(z_sql) }.to_bytes();
    let max_len = usize::try_from(n_byte).ok().filter(|&n| n > 0);

    let handle: &'static Sqlite3<B> = unsafe { &*db };
    let (stmt, rest) = handle.conn.prepare_bytes(sql, max_len);
    handle.open_statements.set(handle.open_statements.get() + 1);

    if let Some(rest) = rest
        && !pz_tail.is_null()
    {
        let offset = sql.len() - rest.len();
        unsafe { *pz_tail = z_sql.add(offset) };
    }
    unsafe { *pp_stmt = Box::into_raw(Box::new(Sqlite3Stmt { stmt, db })) };
    SQLITE_OK
}

/// # Safety
/// `stmt` must be null or a live handle; it must not be used afterwards.
unsafe fn finalize_handle<B: Backend + 'static>(stmt: *mut Sqlite3Stmt<B>) -> c_int {
    if stmt.is_null() {
        return SQLITE_OK;
    }
    let Sqlite3Stmt { stmt, db } = *unsafe { Box::from_raw(stmt) };
    let mut rc = match stmt.finalize() {
        Ok(()) => SQLITE_OK,
        Err(e) => {
            error!(error = %e, "finalize failed");
            SQLITE_ERROR
        }
    };

    let handle = unsafe { &*db };
    let remaining = handle.open_statements.get().saturating_sub(1);
    handle.open_statements.set(remaining);
    if remaining == 0 && handle.zombie.get() {
        let closed = unsafe { destroy(db) };
        if rc == SQLITE_OK {
            rc = closed;
        }
    }
    rc
}

/// # Safety
/// See [`sqlite3_bind_text`].
unsafe fn bind_text_handle<B: Backend + 'static>(
    stmt: *mut Sqlite3Stmt<B>,
    index: c_int,
    value: *const c_char,
    n: c_int,
    destructor: *const c_void,
) -> c_int {
    let Some(handle) = (unsafe { stmt.as_mut() }) else {
        return SQLITE_MISUSE;
    };
    let Some(index) = bind_index(index) else {
        return SQLITE_OK;
    };
    if value.is_null() {
        handle.stmt.bind_null(index);
        return SQLITE_OK;
    }

    let (bytes, len) = match usize::try_from(n) {
        Ok(n) => (unsafe { std::slice::from_raw_parts(value.cast::<u8>(), n) }, Some(n)),
        Err(_) => (unsafe { CStr::from_ptr(value) }.to_bytes(), None),
    };
    let sentinel = destructor as isize;
    handle.stmt.bind_text_with(index, bytes, len, |_| {
        if sentinel != SQLITE_STATIC && sentinel != SQLITE_TRANSIENT {
            let dispose = unsafe {
                std::mem::transmute::<*const c_void, unsafe extern "C" fn(*mut c_void)>(destructor)
            };
            unsafe { dispose(value.cast_mut().cast::<c_void>()) };
        }
    });
    SQLITE_OK
}

// ─── Exported symbols ─────────────────────────────────────────

/// Open a connection described by the JSON config file `filename`.
///
/// On failure `*pp_db` is set to null and `SQLITE_CANTOPEN` is returned.
///
/// # Safety
/// `filename` must be null or a valid C string; `pp_db` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_open(filename: *const c_char, pp_db: *mut *mut Sqlite3) -> c_int {
    if pp_db.is_null() {
        return SQLITE_MISUSE;
    }
    unsafe { *pp_db = ptr::null_mut() };
    if filename.is_null() {
        return SQLITE_CANTOPEN;
    }

    let Ok(path) = unsafe { CStr::from_ptr(filename) }.to_str() else {
        error!("config path is not valid UTF-8");
        return SQLITE_CANTOPEN;
    };
    match Connection::open(path) {
        Ok(conn) => {
            unsafe { *pp_db = Box::into_raw(Box::new(Sqlite3::new(conn))) };
            SQLITE_OK
        }
        Err(e) => {
            error!(%path, error = %e, "open failed");
            SQLITE_CANTOPEN
        }
    }
}

/// Same as [`sqlite3_open`]; `flags` and `vfs` are ignored.
///
/// # Safety
/// See [`sqlite3_open`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_open_v2(
    filename: *const c_char,
    pp_db: *mut *mut Sqlite3,
    _flags: c_int,
    _vfs: *const c_char,
) -> c_int {
    unsafe { sqlite3_open(filename, pp_db) }
}

/// Close a connection. Returns `SQLITE_BUSY` while statements are outstanding.
///
/// # Safety
/// `db` must be null or a live handle from `sqlite3_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_close(db: *mut Sqlite3) -> c_int {
    unsafe { close_handle(db) }
}

/// Close a connection, deferring until its last statement is finalized.
///
/// # Safety
/// `db` must be null or a live handle from `sqlite3_open`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_close_v2(db: *mut Sqlite3) -> c_int {
    unsafe { close_handle_v2(db) }
}

/// Prepare the first statement of `z_sql`.
///
/// `n_byte > 0` limits how much of `z_sql` is scanned. `*pz_tail`, when
/// requested, points past the consumed statement or is null if nothing is
/// left. A statement the backend rejects, or one that is not valid UTF-8,
/// still yields a handle; its first step reports `SQLITE_ERROR`.
///
/// # Safety
/// `db` must be a live handle, `z_sql` a valid C string, `pp_stmt` writable,
/// and `pz_tail` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_prepare(
    db: *mut Sqlite3,
    z_sql: *const c_char,
    n_byte: c_int,
    pp_stmt: *mut *mut Sqlite3Stmt,
    pz_tail: *mut *const c_char,
) -> c_int {
    unsafe { prepare_handle(db, z_sql, n_byte, pp_stmt, pz_tail) }
}

/// Same as [`sqlite3_prepare`].
///
/// # Safety
/// See [`sqlite3_prepare`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_prepare_v2(
    db: *mut Sqlite3,
    z_sql: *const c_char,
    n_byte: c_int,
    pp_stmt: *mut *mut Sqlite3Stmt,
    pz_tail: *mut *const c_char,
) -> c_int {
    unsafe { prepare_handle(db, z_sql, n_byte, pp_stmt, pz_tail) }
}

/// Advance a statement: `SQLITE_ROW`, `SQLITE_DONE` or `SQLITE_ERROR`.
///
/// # Safety
/// `stmt` must be null or a live handle from `sqlite3_prepare`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_step(stmt: *mut Sqlite3Stmt) -> c_int {
    match unsafe { stmt.as_mut() } {
        Some(handle) => handle.stmt.step().code(),
        None => SQLITE_MISUSE,
    }
}

/// Release a statement. Finalizing null is a no-op.
///
/// # Safety
/// `stmt` must be null or a live handle; it must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_finalize(stmt: *mut Sqlite3Stmt) -> c_int {
    unsafe { finalize_handle(stmt) }
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_bind_null(stmt: *mut Sqlite3Stmt, index: c_int) -> c_int {
    let Some(handle) = (unsafe { stmt.as_mut() }) else {
        return SQLITE_MISUSE;
    };
    if let Some(index) = bind_index(index) {
        handle.stmt.bind_null(index);
    }
    SQLITE_OK
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_bind_int(stmt: *mut Sqlite3Stmt, index: c_int, value: c_int) -> c_int {
    let Some(handle) = (unsafe { stmt.as_mut() }) else {
        return SQLITE_MISUSE;
    };
    if let Some(index) = bind_index(index) {
        handle.stmt.bind_int(index, value);
    }
    SQLITE_OK
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_bind_int64(stmt: *mut Sqlite3Stmt, index: c_int, value: i64) -> c_int {
    let Some(handle) = (unsafe { stmt.as_mut() }) else {
        return SQLITE_MISUSE;
    };
    if let Some(index) = bind_index(index) {
        handle.stmt.bind_int64(index, value);
    }
    SQLITE_OK
}

/// Bind text. A negative `n` reads up to the NUL terminator.
///
/// `destructor` is called with `value` once it has been copied, unless it is
/// `SQLITE_STATIC` (0) or `SQLITE_TRANSIENT` (-1). A null `value` binds NULL.
///
/// # Safety
/// `stmt` must be null or a live handle. `value` must be null, a valid C
/// string when `n < 0`, or point to at least `n` readable bytes. `destructor`
/// must be a sentinel or a function taking `value`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_bind_text(
    stmt: *mut Sqlite3Stmt,
    index: c_int,
    value: *const c_char,
    n: c_int,
    destructor: *const c_void,
) -> c_int {
    unsafe { bind_text_handle(stmt, index, value, n, destructor) }
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_bind_parameter_count(stmt: *mut Sqlite3Stmt) -> c_int {
    unsafe { stmt.as_ref() }.map_or(0, |h| h.stmt.bind_parameter_count() as c_int)
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_column_count(stmt: *mut Sqlite3Stmt) -> c_int {
    unsafe { stmt.as_ref() }.map_or(0, |h| h.stmt.column_count() as c_int)
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_column_int(stmt: *mut Sqlite3Stmt, index: c_int) -> c_int {
    match (unsafe { stmt.as_mut() }, bind_index(index)) {
        (Some(handle), Some(index)) => handle.stmt.column_int(index),
        _ => 0,
    }
}

/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_column_int64(stmt: *mut Sqlite3Stmt, index: c_int) -> i64 {
    match (unsafe { stmt.as_mut() }, bind_index(index)) {
        (Some(handle), Some(index)) => handle.stmt.column_int64(index),
        _ => 0,
    }
}

/// Column text for the current row, or null. The pointer stays valid until
/// the next call on this statement.
///
/// # Safety
/// `stmt` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sqlite3_column_text(stmt: *mut Sqlite3Stmt, index: c_int) -> *const c_uchar {
    match (unsafe { stmt.as_mut() }, bind_index(index)) {
        (Some(handle), Some(index)) => handle
            .stmt
            .column_text(index)
            .map_or(ptr::null(), |text| text.as_ptr().cast::<c_uchar>()),
        _ => ptr::null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StepResult;
    use crate::testing::ScriptedBackend;

    type Db = Sqlite3<ScriptedBackend>;
    type Stmt = Sqlite3Stmt<ScriptedBackend>;

    fn scripted(backend: ScriptedBackend) -> *mut Db {
        Box::into_raw(Box::new(Sqlite3::new(Connection::with_backend(backend))))
    }

    /// Prepare `sql` (NUL-terminated) and return the handle plus the tail offset.
    fn prepare(db: *mut Db, sql: &[u8], n_byte: c_int) -> (*mut Stmt, Option<usize>) {
        let z_sql = sql.as_ptr().cast::<c_char>();
        let mut stmt: *mut Stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        let rc = unsafe { prepare_handle(db, z_sql, n_byte, &mut stmt, &mut tail) };
        assert_eq!(rc, SQLITE_OK);
        assert!(!stmt.is_null());
        let offset = (!tail.is_null()).then(|| tail as usize - z_sql as usize);
        (stmt, offset)
    }

    thread_local! {
        static DISPOSED: Cell<usize> = const { Cell::new(0) };
    }

    extern "C" fn count_dispose(_buf: *mut c_void) {
        DISPOSED.with(|n| n.set(n.get() + 1));
    }

    #[test]
    fn test_open_missing_config_returns_cantopen() {
        let mut db: *mut Sqlite3 = ptr::dangling_mut();
        let rc = unsafe { sqlite3_open(c"/no/such/sqlshim.json".as_ptr(), &mut db) };
        assert_eq!(rc, SQLITE_CANTOPEN);
        assert!(db.is_null());
    }

    #[test]
    fn test_open_null_arguments() {
        let mut db: *mut Sqlite3 = ptr::dangling_mut();
        assert_eq!(unsafe { sqlite3_open(ptr::null(), &mut db) }, SQLITE_CANTOPEN);
        assert!(db.is_null());
        assert_eq!(
            unsafe { sqlite3_open(c"x.json".as_ptr(), ptr::null_mut()) },
            SQLITE_MISUSE
        );
    }

    #[test]
    fn test_null_handles() {
        unsafe {
            assert_eq!(sqlite3_close(ptr::null_mut()), SQLITE_OK);
            assert_eq!(sqlite3_close_v2(ptr::null_mut()), SQLITE_OK);
            assert_eq!(sqlite3_finalize(ptr::null_mut()), SQLITE_OK);
            assert_eq!(sqlite3_step(ptr::null_mut()), SQLITE_MISUSE);
            assert_eq!(sqlite3_bind_int(ptr::null_mut(), 0, 1), SQLITE_MISUSE);
            assert_eq!(sqlite3_bind_null(ptr::null_mut(), 0), SQLITE_MISUSE);
            assert_eq!(
                sqlite3_bind_text(ptr::null_mut(), 0, c"x".as_ptr(), -1, ptr::null()),
                SQLITE_MISUSE
            );
            assert_eq!(sqlite3_bind_parameter_count(ptr::null_mut()), 0);
            assert_eq!(sqlite3_column_count(ptr::null_mut()), 0);
            assert_eq!(sqlite3_column_int(ptr::null_mut(), 0), 0);
            assert_eq!(sqlite3_column_int64(ptr::null_mut(), 0), 0);
            assert!(sqlite3_column_text(ptr::null_mut(), 0).is_null());
        }
    }

    #[test]
    fn test_prepare_without_connection() {
        let mut stmt: *mut Sqlite3Stmt = ptr::dangling_mut();
        let mut tail: *const c_char = c"junk".as_ptr();
        let rc = unsafe {
            sqlite3_prepare_v2(ptr::null_mut(), c"SELECT 1".as_ptr(), -1, &mut stmt, &mut tail)
        };
        assert_eq!(rc, SQLITE_MISUSE);
        assert!(stmt.is_null());
        assert!(tail.is_null());
    }

    #[test]
    fn test_step_codes_match_sqlite() {
        assert_eq!(StepResult::Row.code(), SQLITE_ROW);
        assert_eq!(StepResult::Done.code(), SQLITE_DONE);
        assert_eq!(StepResult::Error.code(), SQLITE_ERROR);
    }

    #[test]
    fn test_prepare_walks_tail_pointers() {
        let db = scripted(
            ScriptedBackend::new()
                .command("CREATE TABLE t(a INT)")
                .command("INSERT INTO t VALUES(1)"),
        );
        let sql = b"CREATE TABLE t(a INT); INSERT INTO t VALUES(1);\0";

        let (first, tail) = prepare(db, sql, -1);
        assert_eq!(tail, Some(22));
        let (second, tail) = prepare(db, &sql[22..], -1);
        assert_eq!(tail, None);

        unsafe {
            assert_eq!((*first).stmt.sql(), "CREATE TABLE t(a INT)");
            assert_eq!((*second).stmt.sql(), "INSERT INTO t VALUES(1)");
            assert_eq!((*first).stmt.step(), StepResult::Done);
            assert_eq!((*second).stmt.step(), StepResult::Done);
            assert_eq!(finalize_handle(first), SQLITE_OK);
            assert_eq!(finalize_handle(second), SQLITE_OK);
            assert_eq!(close_handle(db), SQLITE_OK);
        }
    }

    #[test]
    fn test_invalid_utf8_in_later_statement_keeps_first_and_tail() {
        let db = scripted(ScriptedBackend::new().rows("SELECT 1", &["one"], &[&[Some("1")]]));
        let sql = b"SELECT 1; INSERT INTO t VALUES('caf\xe9')\0";

        let (first, tail) = prepare(db, sql, -1);
        assert_eq!(tail, Some(9));
        let (second, tail) = prepare(db, &sql[9..], -1);
        assert_eq!(tail, None);

        unsafe {
            assert_eq!((*first).stmt.step(), StepResult::Row);
            assert_eq!((*first).stmt.column_int(0), 1);
            assert!(!(*second).stmt.is_prepared());
            assert_eq!((*second).stmt.step(), StepResult::Error);
            assert_eq!((*second).stmt.step(), StepResult::Error);
            assert_eq!(finalize_handle(first), SQLITE_OK);
            assert_eq!(finalize_handle(second), SQLITE_OK);
            assert_eq!(close_handle(db), SQLITE_OK);
        }
    }

    #[test]
    fn test_byte_limit_clamps_the_scan() {
        let db = scripted(ScriptedBackend::new().command("CREATE TABLE t(a INT)"));
        let sql = b"CREATE TABLE t(a INT); junk\0";

        let (limited, tail) = prepare(db, sql, 22);
        assert_eq!(tail, Some(22));
        let (short, _) = prepare(db, sql, 6);

        unsafe {
            assert_eq!((*limited).stmt.sql(), "CREATE TABLE t(a INT)");
            assert_eq!((*limited).stmt.step(), StepResult::Done);
            assert_eq!((*short).stmt.sql(), "CREATE");
            assert_eq!((*short).stmt.step(), StepResult::Error);
            assert_eq!(finalize_handle(limited), SQLITE_OK);
            assert_eq!(finalize_handle(short), SQLITE_OK);
            assert_eq!(close_handle(db), SQLITE_OK);
        }
    }

    #[test]
    fn test_bind_text_destructor_runs_once_for_in_range_index() {
        let db = scripted(ScriptedBackend::new().insert("INSERT INTO t VALUES($1)", "t", 1));
        let (stmt, _) = prepare(db, b"INSERT INTO t VALUES($1)\0", -1);
        let value = c"Audi-X".as_ptr();
        let dispose = count_dispose as *const c_void;

        unsafe {
            assert_eq!(bind_text_handle(stmt, 3, value, -1, dispose), SQLITE_OK);
            assert_eq!(DISPOSED.with(Cell::get), 0);

            assert_eq!(bind_text_handle(stmt, 0, value, -1, SQLITE_TRANSIENT as *const c_void), SQLITE_OK);
            assert_eq!(bind_text_handle(stmt, 0, value, -1, ptr::null()), SQLITE_OK);
            assert_eq!(DISPOSED.with(Cell::get), 0);

            assert_eq!(bind_text_handle(stmt, 0, value, 4, dispose), SQLITE_OK);
            assert_eq!(DISPOSED.with(Cell::get), 1);

            assert_eq!((*stmt).stmt.step(), StepResult::Done);
            assert_eq!(
                (*db).conn.backend().table("t").unwrap(),
                &[vec![Some(b"Audi".to_vec())]]
            );
            assert_eq!(finalize_handle(stmt), SQLITE_OK);
            assert_eq!(close_handle(db), SQLITE_OK);
        }
    }

    #[test]
    fn test_close_is_busy_while_statements_are_open() {
        let db = scripted(ScriptedBackend::new().command("CREATE TABLE t(a INT)"));
        let (stmt, _) = prepare(db, b"CREATE TABLE t(a INT)\0", -1);

        unsafe {
            assert_eq!(close_handle(db), SQLITE_BUSY);
            assert_eq!((*db).open_statements.get(), 1);
            assert_eq!(finalize_handle(stmt), SQLITE_OK);
            assert_eq!((*db).open_statements.get(), 0);
            assert_eq!(close_handle(db), SQLITE_OK);
        }
    }

    #[test]
    fn test_close_v2_defers_until_last_finalize() {
        let db = scripted(ScriptedBackend::new().command("CREATE TABLE t(a INT)"));
        let (first, _) = prepare(db, b"CREATE TABLE t(a INT)\0", -1);
        let (second, _) = prepare(db, b"CREATE TABLE t(a INT)\0", -1);

        unsafe {
            assert_eq!(close_handle_v2(db), SQLITE_OK);
            assert!((*db).zombie.get());
            assert!(!(*db).conn.backend().is_closed());

            assert_eq!(finalize_handle(first), SQLITE_OK);
            assert_eq!((*db).open_statements.get(), 1);
            assert!(!(*db).conn.backend().is_closed());

            // The last finalize tears the zombie connection down.
            assert_eq!(finalize_handle(second), SQLITE_OK);
        }
    }
}
