//! Write path: validation, scope defaulting, deduplication, and updates.
//!
//! [`add`] is the single entry point for new memories. The dedup check and the
//! insert are one statement: `INSERT … ON CONFLICT DO NOTHING RETURNING` against
//! the partial unique index on `(scope, project_id, content_norm)`. If nothing
//! comes back, a live duplicate already exists and is returned instead.

use serde::Serialize;

use crate::db::{Database, Statement, Value};
use crate::error::{MemoryError, Result};
use crate::memory::query::{memory_from_row, ActiveQuery, RETURNING_COLUMNS};
use crate::memory::scope::{resolve_scope, ScopeArgs, ScopeFilter};
use crate::memory::types::{
    canonical_tags, encode_tags, normalize_content, now_timestamp, Memory, MemoryType,
};

/// Options for [`add`]. Everything except content is optional.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Defaults to [`MemoryType::Note`].
    pub memory_type: Option<MemoryType>,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
    pub category: Option<String>,
    pub scope: ScopeArgs,
    /// Project used when `scope` is unscoped; global when this is `None` too.
    pub default_project: Option<String>,
}

/// Result of an [`add`] call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "memory", rename_all = "snake_case")]
pub enum AddOutcome {
    Created(Memory),
    /// A live memory with the same normalized content already exists in scope.
    /// Nothing was written.
    Duplicate(Memory),
}

impl AddOutcome {
    pub fn memory(&self) -> &Memory {
        match self {
            Self::Created(m) | Self::Duplicate(m) => m,
        }
    }

    pub fn into_memory(self) -> Memory {
        match self {
            Self::Created(m) | Self::Duplicate(m) => m,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Attempts before giving up when a duplicate vanishes between the insert and
/// the lookup (a concurrent forget).
const ADD_ATTEMPTS: usize = 3;

/// Store a new memory unless an equivalent one is already live in scope.
pub fn add(db: &dyn Database, content: &str, opts: &AddOptions) -> Result<AddOutcome> {
    // 1. Validate
    let content = content.trim();
    if content.is_empty() {
        return Err(MemoryError::validation("content must not be empty"));
    }
    let intent = resolve_scope(&opts.scope)?;
    let scope = intent.write_scope(opts.default_project.as_deref());
    let memory_type = opts.memory_type.unwrap_or_default();
    let content_norm = normalize_content(content);
    let tags = canonical_tags(&opts.tags);
    let paths = if opts.paths.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&opts.paths)?)
    };
    let category = opts
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    for _ in 0..ADD_ATTEMPTS {
        // 2. Insert-if-absent
        let id = uuid::Uuid::now_v7().to_string();
        let now = now_timestamp();
        let stmt = Statement::new(format!(
            "INSERT INTO memories \
             (id, content, content_norm, type, scope, project_id, tags, category, paths, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT DO NOTHING RETURNING {RETURNING_COLUMNS}"
        ))
        .bind(id)
        .bind(content.to_string())
        .bind(content_norm.clone())
        .bind(memory_type.as_str().to_string())
        .bind(scope.kind().to_string())
        .bind(scope.project_id().map(String::from))
        .bind(encode_tags(&tags))
        .bind(category.map(String::from))
        .bind(paths.clone())
        .bind(now.clone())
        .bind(now);

        let result = db.execute(&stmt)?;
        if let Some(row) = result.first() {
            let memory = memory_from_row(row)?;
            tracing::info!(
                id = %memory.id,
                memory_type = %memory.memory_type,
                scope = %memory.scope,
                "memory added"
            );
            return Ok(AddOutcome::Created(memory));
        }

        // 3. Conflict: return the live duplicate
        let existing = ActiveQuery::new()
            .scope(&ScopeFilter::exact(&scope))
            .normalized_content(&content_norm)
            .fetch_one(db)?;
        if let Some(memory) = existing {
            tracing::info!(id = %memory.id, scope = %scope, "duplicate memory, skipping insert");
            return Ok(AddOutcome::Duplicate(memory));
        }
        tracing::debug!(scope = %scope, "duplicate disappeared before lookup, retrying insert");
    }

    Err(MemoryError::Storage(crate::db::DbError::Unavailable(
        "memory insert kept conflicting with a row that could not be read back".into(),
    )))
}

/// Partial update for [`update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateChanges {
    pub content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub tags: Option<Vec<String>>,
}

impl UpdateChanges {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.memory_type.is_none() && self.tags.is_none()
    }
}

/// Apply `changes` to a live memory in one statement.
///
/// Returns `None` when `id` is unknown or soft-deleted. A content change that
/// would duplicate another live memory in the same scope is rejected.
pub fn update(db: &dyn Database, id: &str, changes: &UpdateChanges) -> Result<Option<Memory>> {
    if changes.is_empty() {
        return get_by_id(db, id);
    }

    let mut sets = vec!["updated_at = ?"];
    let mut args = vec![Value::Text(now_timestamp())];

    if let Some(content) = &changes.content {
        let content = content.trim();
        if content.is_empty() {
            return Err(MemoryError::validation("content must not be empty"));
        }
        sets.push("content = ?");
        args.push(Value::Text(content.to_string()));
        sets.push("content_norm = ?");
        args.push(Value::Text(normalize_content(content)));
    }
    if let Some(memory_type) = changes.memory_type {
        sets.push("type = ?");
        args.push(Value::Text(memory_type.as_str().to_string()));
    }
    if let Some(tags) = &changes.tags {
        sets.push("tags = ?");
        args.push(Value::Text(encode_tags(&canonical_tags(tags))));
    }
    args.push(Value::Text(id.to_string()));

    let stmt = Statement {
        sql: format!(
            "UPDATE memories SET {} WHERE id = ? AND deleted_at IS NULL RETURNING {RETURNING_COLUMNS}",
            sets.join(", ")
        ),
        args,
    };

    let result = match db.execute(&stmt) {
        Ok(result) => result,
        Err(e) if e.is_unique_violation() => {
            return Err(MemoryError::validation(
                "another memory in this scope already has that content",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    match result.first() {
        Some(row) => {
            let memory = memory_from_row(row)?;
            tracing::info!(id = %memory.id, "memory updated");
            Ok(Some(memory))
        }
        None => {
            tracing::debug!(id, "update skipped: no live memory");
            Ok(None)
        }
    }
}

/// Fetch one live memory.
pub fn get_by_id(db: &dyn Database, id: &str) -> Result<Option<Memory>> {
    ActiveQuery::new().id(id).fetch_one(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::memory::types::Scope;

    fn global() -> AddOptions {
        AddOptions {
            scope: ScopeArgs::new(Some(true), None),
            ..Default::default()
        }
    }

    fn project(id: &str) -> AddOptions {
        AddOptions {
            scope: ScopeArgs::new(None, Some(id.into())),
            ..Default::default()
        }
    }

    fn live_rows(db: &dyn Database) -> i64 {
        db.execute(&Statement::new(
            "SELECT COUNT(*) FROM memories WHERE deleted_at IS NULL",
        ))
        .unwrap()
        .scalar_i64()
        .unwrap()
    }

    #[test]
    fn test_add_new_memory() {
        let db = open_memory_database().unwrap();
        let opts = AddOptions {
            memory_type: Some(MemoryType::Decision),
            tags: vec!["db".into(), "arch".into()],
            paths: vec!["src/**/*.rs".into()],
            category: Some("storage".into()),
            ..global()
        };

        let outcome = add(db.as_ref(), "  Use SQLite for local storage ", &opts).unwrap();
        let AddOutcome::Created(memory) = outcome else {
            panic!("expected a new memory");
        };
        assert_eq!(memory.content, "Use SQLite for local storage");
        assert_eq!(memory.memory_type, MemoryType::Decision);
        assert_eq!(memory.scope, Scope::Global);
        assert_eq!(memory.tags, vec!["arch", "db"]);
        assert_eq!(memory.paths, vec!["src/**/*.rs"]);
        assert_eq!(memory.category.as_deref(), Some("storage"));
        assert_eq!(memory.created_at, memory.updated_at);
        assert!(!memory.has_embedding);
        assert_eq!(uuid::Uuid::parse_str(&memory.id).unwrap().get_version_num(), 7);
    }

    #[test]
    fn test_add_defaults_to_note() {
        let db = open_memory_database().unwrap();
        let memory = add(db.as_ref(), "plain", &AddOptions::default())
            .unwrap()
            .into_memory();
        assert_eq!(memory.memory_type, MemoryType::Note);
        assert_eq!(memory.scope, Scope::Global);
    }

    #[test]
    fn test_add_rejects_blank_content() {
        let db = open_memory_database().unwrap();
        let err = add(db.as_ref(), " \n\t", &AddOptions::default()).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(live_rows(db.as_ref()), 0);
    }

    #[test]
    fn test_add_rejects_contradictory_scope() {
        let db = open_memory_database().unwrap();
        let opts = AddOptions {
            scope: ScopeArgs::new(Some(true), Some("web".into())),
            ..Default::default()
        };
        assert!(add(db.as_ref(), "x", &opts).unwrap_err().is_validation());
    }

    #[test]
    fn test_add_uses_default_project_when_unscoped() {
        let db = open_memory_database().unwrap();
        let opts = AddOptions {
            default_project: Some("api".into()),
            ..Default::default()
        };
        let memory = add(db.as_ref(), "x", &opts).unwrap().into_memory();
        assert_eq!(memory.scope, Scope::Project("api".into()));
    }

    #[test]
    fn test_dedup_normalized_content_same_scope() {
        let db = open_memory_database().unwrap();
        let rule = AddOptions {
            memory_type: Some(MemoryType::Rule),
            ..global()
        };

        let first = add(db.as_ref(), "Always use strict mode", &rule).unwrap();
        let second = add(db.as_ref(), "  always   USE strict mode!! ", &rule).unwrap();

        assert!(!first.is_duplicate());
        assert!(second.is_duplicate());
        assert_eq!(first.memory().id, second.memory().id);
        assert_eq!(second.memory().content, "Always use strict mode");
        assert_eq!(second.memory().memory_type, MemoryType::Rule);
        assert_eq!(live_rows(db.as_ref()), 1);
    }

    #[test]
    fn test_dedup_is_per_scope() {
        let db = open_memory_database().unwrap();
        add(db.as_ref(), "Run cargo fmt", &global()).unwrap();
        add(db.as_ref(), "Run cargo fmt", &project("web")).unwrap();
        add(db.as_ref(), "Run cargo fmt", &project("api")).unwrap();
        let again = add(db.as_ref(), "run cargo fmt.", &project("web")).unwrap();

        assert!(again.is_duplicate());
        assert_eq!(live_rows(db.as_ref()), 3);
    }

    #[test]
    fn test_dedup_ignores_forgotten_rows() {
        let db = open_memory_database().unwrap();
        let first = add(db.as_ref(), "ephemeral", &global()).unwrap().into_memory();
        crate::memory::forget::forget(db.as_ref(), &first.id).unwrap();

        let second = add(db.as_ref(), "ephemeral", &global()).unwrap();
        assert!(!second.is_duplicate());
        assert_ne!(second.memory().id, first.id);
    }

    #[test]
    fn test_update_changes_fields_atomically() {
        let db = open_memory_database().unwrap();
        let original = add(db.as_ref(), "Prefer anyhow", &global()).unwrap().into_memory();

        let changes = UpdateChanges {
            content: Some("Prefer thiserror in libraries".into()),
            memory_type: Some(MemoryType::Decision),
            tags: Some(vec!["errors".into()]),
        };
        let updated = update(db.as_ref(), &original.id, &changes).unwrap().unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.content, "Prefer thiserror in libraries");
        assert_eq!(updated.memory_type, MemoryType::Decision);
        assert_eq!(updated.tags, vec!["errors"]);
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);

        // FTS follows the new content
        let hits = db
            .execute(&Statement::new(
                "SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH 'thiserror'",
            ))
            .unwrap()
            .scalar_i64()
            .unwrap();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_update_nonexistent_returns_none() {
        let db = open_memory_database().unwrap();
        let changes = UpdateChanges {
            content: Some("x".into()),
            ..Default::default()
        };
        assert!(update(db.as_ref(), "missing", &changes).unwrap().is_none());
        assert_eq!(live_rows(db.as_ref()), 0);
    }

    #[test]
    fn test_update_forgotten_returns_none() {
        let db = open_memory_database().unwrap();
        let memory = add(db.as_ref(), "gone soon", &global()).unwrap().into_memory();
        crate::memory::forget::forget(db.as_ref(), &memory.id).unwrap();

        let changes = UpdateChanges {
            content: Some("revived".into()),
            ..Default::default()
        };
        assert!(update(db.as_ref(), &memory.id, &changes).unwrap().is_none());
    }

    #[test]
    fn test_update_into_duplicate_is_rejected() {
        let db = open_memory_database().unwrap();
        add(db.as_ref(), "first", &global()).unwrap();
        let second = add(db.as_ref(), "second", &global()).unwrap().into_memory();

        let changes = UpdateChanges {
            content: Some("First.".into()),
            ..Default::default()
        };
        let err = update(db.as_ref(), &second.id, &changes).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(get_by_id(db.as_ref(), &second.id).unwrap().unwrap().content, "second");
    }

    #[test]
    fn test_update_blank_content_rejected() {
        let db = open_memory_database().unwrap();
        let memory = add(db.as_ref(), "keep", &global()).unwrap().into_memory();
        let changes = UpdateChanges {
            content: Some("   ".into()),
            ..Default::default()
        };
        assert!(update(db.as_ref(), &memory.id, &changes).unwrap_err().is_validation());
    }
}
