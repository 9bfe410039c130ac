//! Soft deletion, bulk-forget candidates, and physical cleanup.
//!
//! Forgetting sets `deleted_at`; the row stays for audit and health metrics.
//! Each forget is one `UPDATE … WHERE deleted_at IS NULL`, so of two concurrent
//! forgets on the same id exactly one sees an affected row.

use serde::{Deserialize, Serialize};

use crate::db::{Database, Statement, Value};
use crate::error::Result;
use crate::memory::query::ActiveQuery;
use crate::memory::scope::ScopeFilter;
use crate::memory::types::{format_timestamp, now_timestamp, Memory, MemoryType};

/// Soft-delete one memory. `true` only if it was live before this call.
pub fn forget(db: &dyn Database, id: &str) -> Result<bool> {
    let now = now_timestamp();
    let result = db.execute(
        &Statement::new(
            "UPDATE memories SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.to_string()),
    )?;

    let forgotten = result.rows_affected == 1;
    if forgotten {
        tracing::info!(id, "memory forgotten");
    } else {
        tracing::debug!(id, "forget skipped: no live memory");
    }
    Ok(forgotten)
}

/// Ids per `UPDATE`; keeps each statement well under SQLite's bound-variable cap.
const FORGET_CHUNK: usize = 500;

/// Soft-delete every live memory among `ids`. Returns how many transitioned.
///
/// Large id sets are split across several statements run in one transaction.
pub fn bulk_forget_by_ids(db: &dyn Database, ids: &[String]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let now = now_timestamp();
    let stmts: Vec<Statement> = ids
        .chunks(FORGET_CHUNK)
        .map(|chunk| {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut args = vec![Value::Text(now.clone()), Value::Text(now.clone())];
            args.extend(chunk.iter().map(|id| Value::Text(id.clone())));
            Statement {
                sql: format!(
                    "UPDATE memories SET deleted_at = ?, updated_at = ? \
                     WHERE deleted_at IS NULL AND id IN ({placeholders})"
                ),
                args,
            }
        })
        .collect();

    let count: u64 = db
        .execute_batch(&stmts)?
        .iter()
        .map(|r| r.rows_affected)
        .sum();
    let count = count as usize;
    tracing::info!(requested = ids.len(), forgotten = count, "bulk forget");
    Ok(count)
}

/// Predicate for [`find_to_forget`]. Unset fields do not restrict.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgetFilter {
    #[serde(default)]
    pub types: Vec<MemoryType>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip)]
    pub scope: ScopeFilter,
    pub content_contains: Option<String>,
    pub limit: Option<usize>,
}

impl ForgetFilter {
    /// `true` when no criterion narrows the match, so every live memory in
    /// scope would be selected. Blank tags and a blank needle count as unset.
    pub fn is_unrestricted(&self) -> bool {
        self.types.is_empty()
            && self.tags.iter().all(|t| t.trim().is_empty())
            && self
                .content_contains
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
    }
}

/// Live memories matching `filter`, newest first. Read-only.
pub fn find_to_forget(db: &dyn Database, filter: &ForgetFilter) -> Result<Vec<Memory>> {
    let mut query = ActiveQuery::new()
        .scope(&filter.scope)
        .types(&filter.types)
        .tags_any(&filter.tags);
    if let Some(needle) = filter.content_contains.as_deref().map(str::trim) {
        if !needle.is_empty() {
            query = query.content_contains(needle);
        }
    }
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }
    query.fetch(db)
}

/// Outcome of a [`vacuum`] pass.
#[derive(Debug, Clone, Serialize)]
pub struct VacuumReport {
    pub purged: usize,
    pub older_than_days: u32,
}

/// Physically delete soft-deleted rows whose `deleted_at` is older than
/// `older_than_days`. Zero purges every soft-deleted row.
pub fn vacuum(db: &dyn Database, older_than_days: u32) -> Result<VacuumReport> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(i64::from(older_than_days));
    let result = db.execute(
        &Statement::new("DELETE FROM memories WHERE deleted_at IS NOT NULL AND deleted_at <= ?1")
            .bind(format_timestamp(cutoff)),
    )?;

    let purged = result.rows_affected as usize;
    tracing::info!(purged, older_than_days, "vacuumed soft-deleted memories");
    Ok(VacuumReport {
        purged,
        older_than_days,
    })
}

/// Rebuild the full-text index from live rows in one transaction.
/// Returns the number of rows indexed.
pub fn rebuild_fts(db: &dyn Database) -> Result<u64> {
    let results = db.execute_batch(&[
        Statement::new("DELETE FROM memories_fts"),
        Statement::new(
            "INSERT INTO memories_fts (rowid, content, memory_id) \
             SELECT seq, content, id FROM memories WHERE deleted_at IS NULL",
        ),
    ])?;

    let indexed = results.last().map(|r| r.rows_affected).unwrap_or(0);
    tracing::info!(indexed, "rebuilt full-text index");
    Ok(indexed)
}
