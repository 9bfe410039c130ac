//! Hosted libSQL replica handle.
//!
//! Built on `libsql`'s remote client. The client is async; [`Database`] is not,
//! so the handle owns a small dedicated runtime and blocks on it. Callers
//! inside the server already sit on the blocking pool, so blocking here never
//! stalls an async worker.
//!
//! Every call takes a fresh connection (a new server-side stream), which keeps
//! one caller's transaction from absorbing another caller's statements.

use std::future::Future;
use std::time::Duration;

use libsql::{Builder, Connection, TransactionBehavior};
use tokio::runtime::Runtime;

use super::{Database, DbError, ResultSet, Row, Statement, Value};

/// Remote round-trips are slow; generous, but never unbounded.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteDatabase {
    // Option so Drop can hand the runtime off without blocking.
    runtime: Option<Runtime>,
    db: libsql::Database,
    endpoint: String,
}

impl RemoteDatabase {
    /// Create a handle for `endpoint` (`libsql://`, `https://`, or `http://`).
    ///
    /// Must not be called from inside an async task; use `spawn_blocking`.
    pub fn new(endpoint: &str, token: &str) -> Result<Self, DbError> {
        let endpoint = validate_endpoint(endpoint)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("cairn-replica")
            .enable_all()
            .build()
            .map_err(|e| DbError::Unavailable(format!("failed to start replica runtime: {e}")))?;

        let db = runtime
            .block_on(Builder::new_remote(endpoint.clone(), token.to_string()).build())
            .map_err(|e| DbError::Unavailable(format!("failed to connect to {endpoint}: {e}")))?;

        Ok(Self {
            runtime: Some(runtime),
            db,
            endpoint,
        })
    }

    fn block_on<T>(
        &self,
        work: impl Future<Output = Result<T, DbError>>,
    ) -> Result<T, DbError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| DbError::Unavailable("replica runtime has shut down".into()))?;

        runtime.block_on(async {
            tokio::time::timeout(REQUEST_TIMEOUT, work)
                .await
                .map_err(|_| {
                    DbError::Transport(format!(
                        "no response from {} within {}s",
                        self.endpoint,
                        REQUEST_TIMEOUT.as_secs()
                    ))
                })?
        })
    }

    fn connect(&self) -> Result<Connection, DbError> {
        Ok(self.db.connect()?)
    }
}

impl Database for RemoteDatabase {
    fn execute(&self, stmt: &Statement) -> Result<ResultSet, DbError> {
        let conn = self.connect()?;
        self.block_on(run(&conn, stmt))
    }

    fn execute_batch(&self, stmts: &[Statement]) -> Result<Vec<ResultSet>, DbError> {
        let conn = self.connect()?;
        self.block_on(async {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .await?;

            let mut results = Vec::with_capacity(stmts.len());
            for stmt in stmts {
                match run(&tx, stmt).await {
                    Ok(set) => results.push(set),
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            tracing::warn!(error = %rollback, "replica rollback failed");
                        }
                        return Err(e);
                    }
                }
            }

            tx.commit().await?;
            Ok(results)
        })
    }

    fn describe(&self) -> String {
        self.endpoint.clone()
    }
}

impl Drop for RemoteDatabase {
    fn drop(&mut self) {
        // The last handle may be released on an async worker, where a
        // blocking runtime shutdown panics.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl From<libsql::Error> for DbError {
    fn from(err: libsql::Error) -> Self {
        DbError::Statement {
            message: err.to_string(),
            code: None,
        }
    }
}

/// Accept the schemes the libSQL client speaks; reject anything else up front.
pub fn validate_endpoint(endpoint: &str) -> Result<String, DbError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let (scheme, rest) = endpoint
        .split_once("://")
        .ok_or_else(|| DbError::Unavailable(format!("replica endpoint has no scheme: {endpoint}")))?;

    if !matches!(scheme, "libsql" | "https" | "http") {
        return Err(DbError::Unavailable(format!(
            "unsupported replica scheme: {scheme}"
        )));
    }
    if rest.is_empty() {
        return Err(DbError::Unavailable("replica endpoint has no host".into()));
    }
    Ok(endpoint.to_string())
}

/// Execute one statement, collecting every row it returns.
async fn run(conn: &Connection, stmt: &Statement) -> Result<ResultSet, DbError> {
    let params: Vec<libsql::Value> = stmt.args.iter().map(to_libsql).collect();
    let mut cursor = conn.query(&stmt.sql, params).await?;

    let width = cursor.column_count();
    let columns = (0..width)
        .map(|i| cursor.column_name(i).unwrap_or_default().to_string())
        .collect();

    let mut rows = Vec::new();
    while let Some(row) = cursor.next().await? {
        let values = (0..width)
            .map(|i| row.get_value(i).map(from_libsql))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(Row::new(values));
    }

    Ok(ResultSet {
        columns,
        rows,
        rows_affected: conn.changes(),
    })
}

fn to_libsql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Integer(i) => libsql::Value::Integer(*i),
        Value::Real(f) => libsql::Value::Real(*f),
        Value::Text(s) => libsql::Value::Text(s.clone()),
        Value::Blob(b) => libsql::Value::Blob(b.clone()),
    }
}

fn from_libsql(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Integer(i),
        libsql::Value::Real(f) => Value::Real(f),
        libsql::Value::Text(s) => Value::Text(s),
        libsql::Value::Blob(b) => Value::Blob(b),
    }
}
