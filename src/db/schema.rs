//! SQL DDL for all cairn tables.
//!
//! Defines `memories`, the standalone `memories_fts` (FTS5) index with the
//! triggers that keep it in step with live rows, and `schema_meta`. Every
//! statement uses `IF NOT EXISTS` so initialization can run on every start.

use super::{Database, DbError, Statement};

/// Core tables, indexes, and FTS sync triggers, one statement per entry.
///
/// `seq` aliases the rowid so FTS rows stay keyed correctly across `VACUUM`.
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS memories (
    seq INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL CHECK(length(trim(content)) > 0),
    content_norm TEXT NOT NULL,
    type TEXT NOT NULL DEFAULT 'note' CHECK(type IN ('rule','decision','fact','note','skill')),
    scope TEXT NOT NULL CHECK(scope IN ('global','project')),
    project_id TEXT,
    tags TEXT NOT NULL DEFAULT '',
    category TEXT,
    paths TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    CHECK((scope = 'global' AND project_id IS NULL) OR (scope = 'project' AND project_id IS NOT NULL))
)"#,
    "CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(type)",
    "CREATE INDEX IF NOT EXISTS idx_memories_scope ON memories(scope, project_id)",
    "CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_memories_deleted ON memories(deleted_at)",
    // At most one live row per normalized content per scope.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_dedup \
     ON memories(scope, COALESCE(project_id, ''), content_norm) WHERE deleted_at IS NULL",
    "CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(content, memory_id UNINDEXED)",
    r#"CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories
WHEN new.deleted_at IS NULL
BEGIN
    INSERT INTO memories_fts (rowid, content, memory_id) VALUES (new.seq, new.content, new.id);
END"#,
    r#"CREATE TRIGGER IF NOT EXISTS memories_fts_update AFTER UPDATE OF content, deleted_at ON memories
BEGIN
    DELETE FROM memories_fts WHERE rowid = old.seq;
    INSERT INTO memories_fts (rowid, content, memory_id)
        SELECT new.seq, new.content, new.id WHERE new.deleted_at IS NULL;
END"#,
    r#"CREATE TRIGGER IF NOT EXISTS memories_fts_delete AFTER DELETE ON memories
BEGIN
    DELETE FROM memories_fts WHERE rowid = old.seq;
END"#,
    r#"CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)"#,
    "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
];

/// Initialize all schema objects in one transaction. Idempotent.
pub fn init_schema(db: &dyn Database) -> Result<(), DbError> {
    let stmts: Vec<Statement> = SCHEMA_STATEMENTS.iter().map(|s| Statement::new(*s)).collect();
    db.execute_batch(&stmts)?;
    Ok(())
}
