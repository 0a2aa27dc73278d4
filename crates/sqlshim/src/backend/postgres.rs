//! PostgreSQL backend over the `sqlshim-pg` wire driver.

use sqlshim_pg::{PgConfig, PgConnection, PreparedDesc, Row, types};
use tracing::{debug, info, trace};

use super::{Backend, ColumnMeta, PreparedStatement};
use crate::bind::ParamValue;
use crate::error::{Error, Result};

/// Database the create-if-missing path connects to.
const MAINTENANCE_DB: &str = "postgres";

/// A PostgreSQL session.
pub struct PgBackend {
    conn: PgConnection,
}

impl PgBackend {
    /// Connect, creating the configured database first if it does not exist.
    pub fn connect(config: &PgConfig) -> Result<Self> {
        match PgConnection::connect(config) {
            Ok(conn) => Ok(Self { conn }),
            Err(e) if e.is_missing_database() && config.database != MAINTENANCE_DB => {
                info!(database = %config.database, "database does not exist, creating it");
                let mut admin = PgConnection::connect(&config.with_database(MAINTENANCE_DB))?;
                admin.simple_query(&create_database_sql(&config.database))?;
                admin.terminate()?;
                Ok(Self {
                    conn: PgConnection::connect(config)?,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn connection(&self) -> &PgConnection {
        &self.conn
    }
}

fn create_database_sql(name: &str) -> String {
    format!("CREATE DATABASE \"{}\"", name.replace('"', "\"\""))
}

/// A named server-side statement plus the rows of its last execution.
pub struct PgStatement {
    desc: PreparedDesc,
    columns: Option<Vec<ColumnMeta>>,
    compute_max_length: bool,
    pending: Option<Vec<Row>>,
    rows: Vec<Row>,
    /// Index of the current row in `rows`.
    current: Option<usize>,
    next: usize,
}

impl PgStatement {
    fn new(desc: PreparedDesc) -> Self {
        let columns = desc
            .columns
            .as_ref()
            .map(|cols| cols.iter().map(|c| ColumnMeta::new(c.name.clone())).collect());
        Self {
            desc,
            columns,
            compute_max_length: false,
            pending: None,
            rows: Vec::new(),
            current: None,
            next: 0,
        }
    }

    /// Server-side statement name.
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    fn current_row(&self) -> Option<&Row> {
        self.current.and_then(|i| self.rows.get(i))
    }

    fn type_oid(&self, index: usize) -> u32 {
        self.desc
            .columns
            .as_ref()
            .and_then(|cols| cols.get(index))
            .map_or(types::oid::TEXT, |c| c.type_oid)
    }
}

impl PreparedStatement for PgStatement {
    fn param_count(&self) -> usize {
        self.desc.param_types.len()
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
        self.current_row()?.value_len(index)
    }

    fn read_integer(&self, index: usize) -> Result<Option<i64>> {
        let row = self
            .current_row()
            .ok_or_else(|| Error::Backend("no current row".to_string()))?;
        Ok(row
            .get(index)
            .map(|data| types::text_to_integer(self.type_oid(index), data)))
    }

    fn read_text(&self, index: usize, buf: &mut [u8]) -> Result<Option<usize>> {
        let row = self
            .current_row()
            .ok_or_else(|| Error::Backend("no current row".to_string()))?;
        Ok(row.get(index).map(|data| {
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            data.len()
        }))
    }
}

impl Backend for PgBackend {
    type Statement = PgStatement;

    fn prepare(&mut self, sql: &str) -> Result<PgStatement> {
        let desc = self.conn.prepare(sql)?;
        debug!(
            name = %desc.name,
            params = desc.param_types.len(),
            columns = desc.columns.as_ref().map_or(0, Vec::len),
            "prepared"
        );
        for column in desc.columns.iter().flatten() {
            trace!(column = %column.name, ty = types::type_name(column.type_oid), "result column");
        }
        Ok(PgStatement::new(desc))
    }

    fn execute(&mut self, stmt: &mut PgStatement, params: &[ParamValue]) -> Result<()> {
        let encoded: Vec<_> = params.iter().map(ParamValue::to_text).collect();
        let wire: Vec<Option<&[u8]>> = encoded.iter().map(|p| p.as_deref()).collect();
        let execution = self.conn.execute(&stmt.desc.name, &wire)?;
        debug!(
            name = %stmt.desc.name,
            rows = execution.rows.len(),
            affected = execution.rows_affected,
            "executed"
        );
        stmt.pending = Some(execution.rows);
        stmt.current = None;
        stmt.next = 0;
        Ok(())
    }

    fn store_result(&mut self, stmt: &mut PgStatement) -> Result<u64> {
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

    fn close_statement(&mut self, stmt: PgStatement) -> Result<()> {
        self.conn.close_statement(&stmt.desc.name)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.conn.terminate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlshim_pg::ColumnDesc;
    use sqlshim_pg::protocol::FormatCode;

    fn column(name: &str, type_oid: u32) -> ColumnDesc {
        ColumnDesc {
            name: name.to_string(),
            table_oid: 0,
            col_attr: 0,
            type_oid,
            type_size: -1,
            type_modifier: -1,
            format_code: FormatCode::Text,
        }
    }

    fn stored(rows: Vec<Row>) -> PgStatement {
        let mut stmt = PgStatement::new(PreparedDesc {
            name: "s0".to_string(),
            param_types: vec![],
            columns: Some(vec![column("id", types::oid::INT4), column("name", types::oid::TEXT)]),
        });
        stmt.update_max_length(true);
        stmt.rows = rows;
        stmt
    }

    #[test]
    fn test_create_database_sql_quotes_name() {
        assert_eq!(create_database_sql("cars"), "CREATE DATABASE \"cars\"");
        assert_eq!(create_database_sql("a\"b"), "CREATE DATABASE \"a\"\"b\"");
    }

    #[test]
    fn test_fetch_walks_rows() {
        let mut stmt = stored(vec![
            Row::new(vec![Some(&b"1"[..]), Some(&b"Audi"[..])]),
            Row::new(vec![Some(&b"8"[..]), None]),
        ]);
        assert_eq!(stmt.column_length(0), None);

        assert!(stmt.fetch().unwrap());
        assert_eq!(stmt.column_length(1), Some(4));
        assert_eq!(stmt.read_integer(0).unwrap(), Some(1));

        let mut buf = [0u8; 4];
        assert_eq!(stmt.read_text(1, &mut buf).unwrap(), Some(4));
        assert_eq!(&buf, b"Audi");

        assert!(stmt.fetch().unwrap());
        assert_eq!(stmt.column_length(1), None);
        assert_eq!(stmt.read_text(1, &mut buf).unwrap(), None);

        assert!(!stmt.fetch().unwrap());
        assert!(stmt.read_integer(0).is_err());
    }

    #[test]
    fn test_short_buffer_truncates() {
        let mut stmt = stored(vec![Row::new(vec![Some(&b"1"[..]), Some(&b"Volkswagen"[..])])]);
        stmt.fetch().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stmt.read_text(1, &mut buf).unwrap(), Some(10));
        assert_eq!(&buf, b"Volk");
    }

    #[test]
    fn test_columns_metadata() {
        let stmt = stored(vec![]);
        let names: Vec<&str> = stmt
            .columns()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["id", "name"]);
        assert_eq!(stmt.param_count(), 0);
    }
}
