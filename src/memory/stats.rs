use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::migrations::{get_embedding_model, get_schema_version};
use crate::db::{Database, Statement};
use crate::error::Result;
use crate::memory::types::{MemoryType, Scope};

/// Response from memory_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_memories: u64,
    pub active_memories: u64,
    pub deleted_memories: u64,
    pub pending_embeddings: u64,
    /// Active memories per type.
    pub by_type: BTreeMap<String, u64>,
    /// Active memories per scope (`global`, `project:<id>`).
    pub by_scope: BTreeMap<String, u64>,
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<String>,
}

/// Compute memory store statistics. Soft-deleted rows count toward
/// `total_memories` and `deleted_memories` only.
pub fn memory_stats(db: &dyn Database) -> Result<StatsResponse> {
    let totals = db.execute(&Statement::new(
        "SELECT COUNT(*), \
                COALESCE(SUM(deleted_at IS NULL), 0), \
                COALESCE(SUM(deleted_at IS NULL AND embedding IS NULL), 0), \
                MIN(CASE WHEN deleted_at IS NULL THEN created_at END), \
                MAX(CASE WHEN deleted_at IS NULL THEN created_at END) \
         FROM memories",
    ))?;
    let (total, active, pending, oldest, newest) = match totals.first() {
        Some(row) => (
            row.integer(0)? as u64,
            row.integer(1)? as u64,
            row.integer(2)? as u64,
            row.opt_text(3)?,
            row.opt_text(4)?,
        ),
        None => (0, 0, 0, None, None),
    };

    Ok(StatsResponse {
        total_memories: total,
        active_memories: active,
        deleted_memories: total - active,
        pending_embeddings: pending,
        by_type: count_by_type(db)?,
        by_scope: count_by_scope(db)?,
        schema_version: get_schema_version(db)?,
        embedding_model: get_embedding_model(db)?,
        oldest_memory: oldest,
        newest_memory: newest,
    })
}

/// Count by memory type.
fn count_by_type(db: &dyn Database) -> Result<BTreeMap<String, u64>> {
    let mut map: BTreeMap<String, u64> = MemoryType::ALL
        .iter()
        .map(|t| (t.as_str().to_string(), 0))
        .collect();

    let result = db.execute(&Statement::new(
        "SELECT type, COUNT(*) FROM memories WHERE deleted_at IS NULL GROUP BY type",
    ))?;
    for row in &result.rows {
        map.insert(row.text(0)?, row.integer(1)? as u64);
    }
    Ok(map)
}

/// Count by scope.
fn count_by_scope(db: &dyn Database) -> Result<BTreeMap<String, u64>> {
    let result = db.execute(&Statement::new(
        "SELECT scope, project_id, COUNT(*) FROM memories WHERE deleted_at IS NULL \
         GROUP BY scope, project_id",
    ))?;

    let mut map = BTreeMap::new();
    for row in &result.rows {
        let scope = Scope::from_columns(&row.text(0)?, row.opt_text(1)?)?;
        map.insert(scope.to_string(), row.integer(2)? as u64);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::memory::forget::forget;
    use crate::memory::scope::ScopeArgs;
    use crate::memory::store::{add, AddOptions};

    #[test]
    fn empty_store_stats() {
        let db = open_memory_database().unwrap();
        let stats = memory_stats(db.as_ref()).unwrap();
        assert_eq!(stats.total_memories, 0);
        assert_eq!(stats.by_type.len(), 5);
        assert!(stats.by_scope.is_empty());
        assert!(stats.oldest_memory.is_none());
    }

    #[test]
    fn stats_split_active_and_deleted() {
        let db = open_memory_database().unwrap();
        let rule = AddOptions {
            memory_type: Some(MemoryType::Rule),
            ..Default::default()
        };
        let web = AddOptions {
            scope: ScopeArgs::new(None, Some("web".into())),
            ..Default::default()
        };
        add(db.as_ref(), "a rule", &rule).unwrap();
        add(db.as_ref(), "a web note", &web).unwrap();
        let gone = add(db.as_ref(), "gone", &AddOptions::default())
            .unwrap()
            .into_memory();
        forget(db.as_ref(), &gone.id).unwrap();

        let stats = memory_stats(db.as_ref()).unwrap();
        assert_eq!(stats.total_memories, 3);
        assert_eq!(stats.active_memories, 2);
        assert_eq!(stats.deleted_memories, 1);
        assert_eq!(stats.pending_embeddings, 2);
        assert_eq!(stats.by_type["rule"], 1);
        assert_eq!(stats.by_type["note"], 1);
        assert_eq!(stats.by_scope["global"], 1);
        assert_eq!(stats.by_scope["project:web"], 1);
        assert_eq!(stats.schema_version, crate::db::migrations::CURRENT_SCHEMA_VERSION);
    }
}
