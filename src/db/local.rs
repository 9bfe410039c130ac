//! Embedded SQLite handle backed by rusqlite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};

use super::{Database, DbError, ResultSet, Row, Statement, Value};

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A local database file (or in-memory database for tests).
///
/// The mutex only serializes use of the one connection this handle owns;
/// cross-process coordination is left to SQLite's own locking.
pub struct LocalDatabase {
    conn: Mutex<Connection>,
    label: String,
}

impl LocalDatabase {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbError::Unavailable(format!(
                        "failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL lets CLI readers proceed while the server writes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
            label: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            label: ":memory:".into(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|e| DbError::Unavailable(format!("db lock poisoned: {e}")))
    }
}

impl Database for LocalDatabase {
    fn execute(&self, stmt: &Statement) -> Result<ResultSet, DbError> {
        let conn = self.lock()?;
        run(&conn, stmt)
    }

    fn execute_batch(&self, stmts: &[Statement]) -> Result<Vec<ResultSet>, DbError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut results = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            results.push(run(&tx, stmt)?);
        }
        tx.commit()?;
        Ok(results)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Execute one statement on a borrowed connection, collecting every row.
fn run(conn: &Connection, stmt: &Statement) -> Result<ResultSet, DbError> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let params = rusqlite::params_from_iter(stmt.args.iter());

    if columns.is_empty() {
        let affected = prepared.execute(params)?;
        return Ok(ResultSet {
            columns,
            rows: Vec::new(),
            rows_affected: affected as u64,
        });
    }

    let width = columns.len();
    let mut rows = Vec::new();
    let mut cursor = prepared.query(params)?;
    while let Some(row) = cursor.next()? {
        let values = (0..width)
            .map(|i| row.get::<_, Value>(i))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(Row::new(values));
    }
    drop(cursor);

    // RETURNING clauses report rows through the cursor and changes through the connection
    let rows_affected = if prepared.readonly() {
        0
    } else {
        conn.changes() as u64
    };

    Ok(ResultSet {
        columns,
        rows,
        rows_affected,
    })
}
