//! Database handle abstraction.
//!
//! Every engine component talks to storage through [`Database`]: a statement
//! goes in (SQL plus positional args), rows come out. Two handles implement it:
//! [`local::LocalDatabase`] for an embedded SQLite file and
//! [`remote::RemoteDatabase`] for a hosted libSQL replica. The variant is chosen
//! once in [`open_database`]; nothing downstream branches on it.

pub mod local;
pub mod migrations;
pub mod remote;
pub mod schema;
pub mod target;

use std::sync::Arc;

use thiserror::Error;

use crate::error::MemoryError;
use target::ConnectionTarget;

/// Dynamically typed SQL value shared by both handles.
pub use rusqlite::types::Value;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The remote replica rejected a statement.
    #[error("remote statement failed: {message}")]
    Statement {
        message: String,
        code: Option<String>,
    },

    /// Transport-level failure talking to the remote replica.
    #[error("remote transport: {0}")]
    Transport(String),

    #[error("connection unavailable: {0}")]
    Unavailable(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl DbError {
    /// `true` when the statement tripped a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            }
            DbError::Statement { message, code } => {
                message.contains("UNIQUE constraint failed")
                    || code.as_deref().is_some_and(|c| c.starts_with("SQLITE_CONSTRAINT"))
            }
            _ => false,
        }
    }
}

/// A single SQL statement with positional (`?1`, `?2`, …) arguments.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// One result row; columns are addressed by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn value(&self, idx: usize) -> Result<&Value, DbError> {
        self.0
            .get(idx)
            .ok_or_else(|| DbError::Decode(format!("column {idx} out of range")))
    }

    pub fn text(&self, idx: usize) -> Result<String, DbError> {
        self.opt_text(idx)?
            .ok_or_else(|| DbError::Decode(format!("column {idx} is NULL")))
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, DbError> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Integer(i) => Ok(Some(i.to_string())),
            Value::Real(f) => Ok(Some(f.to_string())),
            Value::Blob(_) => Err(DbError::Decode(format!("column {idx} is a blob"))),
        }
    }

    pub fn integer(&self, idx: usize) -> Result<i64, DbError> {
        match self.value(idx)? {
            Value::Integer(i) => Ok(*i),
            Value::Real(f) => Ok(*f as i64),
            Value::Text(s) => s
                .parse()
                .map_err(|_| DbError::Decode(format!("column {idx} is not an integer: {s}"))),
            other => Err(DbError::Decode(format!(
                "column {idx} is not an integer: {other:?}"
            ))),
        }
    }

    pub fn opt_blob(&self, idx: usize) -> Result<Option<Vec<u8>>, DbError> {
        match self.value(idx)? {
            Value::Null => Ok(None),
            Value::Blob(b) => Ok(Some(b.clone())),
            other => Err(DbError::Decode(format!("column {idx} is not a blob: {other:?}"))),
        }
    }
}

/// Output of one executed statement.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl ResultSet {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// First column of the first row as an integer (`COUNT(*)` and friends).
    pub fn scalar_i64(&self) -> Result<i64, DbError> {
        self.first()
            .ok_or_else(|| DbError::Decode("expected one row, got none".into()))?
            .integer(0)
    }
}

/// The execute-statement capability every storage target provides.
///
/// Handles are shared across threads and must not hold per-call state.
pub trait Database: Send + Sync {
    /// Run one statement. Rows are returned for queries and `RETURNING` clauses.
    fn execute(&self, stmt: &Statement) -> Result<ResultSet, DbError>;

    /// Run statements in order inside one transaction: all apply or none do.
    fn execute_batch(&self, stmts: &[Statement]) -> Result<Vec<ResultSet>, DbError>;

    /// Human-readable location for logs (file path or endpoint host).
    fn describe(&self) -> String;
}

/// Build the handle for `target`, then bring the schema up to date.
///
/// Any failure here is a setup error: the caller gets no handle at all.
pub fn open_database(target: &ConnectionTarget) -> Result<Arc<dyn Database>, MemoryError> {
    let db: Arc<dyn Database> = match target {
        ConnectionTarget::Local { path } => Arc::new(
            local::LocalDatabase::open(path).map_err(|e| MemoryError::Setup(e.to_string()))?,
        ),
        ConnectionTarget::Replica { endpoint, token } => Arc::new(
            remote::RemoteDatabase::new(endpoint, token)
                .map_err(|e| MemoryError::Setup(e.to_string()))?,
        ),
    };

    prepare(db.as_ref())?;
    tracing::info!(db = %db.describe(), "database initialized");
    Ok(db)
}

/// Apply schema and migrations to an already-open handle. Idempotent.
pub fn prepare(db: &dyn Database) -> Result<(), MemoryError> {
    schema::init_schema(db)
        .map_err(|e| MemoryError::Setup(format!("failed to initialize schema: {e}")))?;
    migrations::run_migrations(db)
        .map_err(|e| MemoryError::Setup(format!("failed to run migrations: {e}")))?;
    Ok(())
}

/// Open a fully prepared in-memory database.
pub fn open_memory_database() -> Result<Arc<dyn Database>, MemoryError> {
    let db: Arc<dyn Database> = Arc::new(
        local::LocalDatabase::open_in_memory().map_err(|e| MemoryError::Setup(e.to_string()))?,
    );
    prepare(db.as_ref())?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_accessors_decode_values() {
        let row = Row::new(vec![
            Value::Text("abc".into()),
            Value::Null,
            Value::Integer(7),
            Value::Blob(vec![1, 2]),
        ]);
        assert_eq!(row.text(0).unwrap(), "abc");
        assert_eq!(row.opt_text(1).unwrap(), None);
        assert_eq!(row.integer(2).unwrap(), 7);
        assert_eq!(row.opt_blob(3).unwrap(), Some(vec![1, 2]));
        assert!(row.text(1).is_err());
        assert!(row.value(9).is_err());
    }

    #[test]
    fn statement_bind_appends_args() {
        let stmt = Statement::new("SELECT ?1, ?2")
            .bind("a".to_string())
            .bind(2i64);
        assert_eq!(stmt.args, vec![Value::Text("a".into()), Value::Integer(2)]);
    }

    #[test]
    fn remote_unique_violation_detected() {
        let err = DbError::Statement {
            message: "UNIQUE constraint failed: index 'idx_memories_dedup'".into(),
            code: None,
        };
        assert!(err.is_unique_violation());
        assert!(!DbError::Transport("timeout".into()).is_unique_violation());
    }

    #[test]
    fn memory_database_is_prepared() {
        let db = open_memory_database().unwrap();
        let version = migrations::get_schema_version(db.as_ref()).unwrap();
        assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);
    }
}
