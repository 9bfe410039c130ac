//! Forward-only schema migration framework.
//!
//! Tracks the schema version in `schema_meta` and runs sequential migrations
//! to bring the database up to [`CURRENT_SCHEMA_VERSION`].

use super::{Database, DbError, Statement};

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Get the current schema version from the database.
pub fn get_schema_version(db: &dyn Database) -> Result<u32, DbError> {
    let result = db.execute(&Statement::new(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
    ))?;
    Ok(match result.first() {
        Some(row) => row.text(0)?.parse::<u32>().unwrap_or(0),
        None => 0,
    })
}

/// Get the stored embedding model identifier, if any.
pub fn get_embedding_model(db: &dyn Database) -> Result<Option<String>, DbError> {
    let result = db.execute(&Statement::new(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
    ))?;
    match result.first() {
        Some(row) => row.opt_text(0),
        None => Ok(None),
    }
}

/// Set the stored embedding model identifier.
pub fn set_embedding_model(db: &dyn Database, model: &str) -> Result<(), DbError> {
    db.execute(
        &Statement::new(
            "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        )
        .bind(model.to_string()),
    )?;
    Ok(())
}

/// Run any pending forward-only migrations. Each migration runs in a transaction
/// together with its version bump.
pub fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let mut version = get_schema_version(db)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let mut stmts = match next {
            2 => migrate_v1_to_v2(db)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        };
        stmts.push(
            Statement::new("UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'")
                .bind(next.to_string()),
        );
        db.execute_batch(&stmts)?;
        version = next;
    }

    Ok(())
}

/// Migration v1 → v2: embeddings readiness. Adds the `embedding` column unless
/// an earlier partial run already did.
fn migrate_v1_to_v2(db: &dyn Database) -> Result<Vec<Statement>, DbError> {
    let mut stmts = Vec::new();
    if !has_column(db, "memories", "embedding")? {
        stmts.push(Statement::new("ALTER TABLE memories ADD COLUMN embedding BLOB"));
    }
    stmts.push(Statement::new(
        "CREATE INDEX IF NOT EXISTS idx_memories_pending_embedding \
         ON memories(created_at) WHERE embedding IS NULL AND deleted_at IS NULL",
    ));
    Ok(stmts)
}

fn has_column(db: &dyn Database, table: &str, column: &str) -> Result<bool, DbError> {
    let result = db.execute(
        &Statement::new("SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2")
            .bind(table.to_string())
            .bind(column.to_string()),
    )?;
    Ok(result.scalar_i64()? > 0)
}
