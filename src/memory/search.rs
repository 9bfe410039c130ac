//! Read path: listing, text search, rules, and context assembly.
//!
//! Every function here builds on [`ActiveQuery`], so soft-deleted rows never
//! reach a caller.

use serde::Serialize;

use crate::db::Database;
use crate::error::Result;
use crate::memory::query::{ActiveQuery, TermMode};
use crate::memory::scope::ScopeFilter;
use crate::memory::types::{Memory, MemoryType};

/// Default result bound for [`search`].
pub const DEFAULT_SEARCH_LIMIT: usize = 20;
/// Default bound on non-rule memories in [`get_context`].
pub const DEFAULT_CONTEXT_LIMIT: usize = 10;

// ── list ──────────────────────────────────────────────────────────────────────

/// Filter for [`list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// `None` means no bound.
    pub limit: Option<usize>,
    /// Empty means every type.
    pub types: Vec<MemoryType>,
    /// OR-matched: a memory qualifies with any one of these.
    pub tags: Vec<String>,
    /// Overrides `scope` with global memories only.
    pub global_only: bool,
    pub scope: ScopeFilter,
}

/// Live memories matching `filter`, newest first.
pub fn list(db: &dyn Database, filter: &ListFilter) -> Result<Vec<Memory>> {
    let scope = if filter.global_only {
        ScopeFilter::GlobalOnly
    } else {
        filter.scope.clone()
    };

    let mut query = ActiveQuery::new()
        .scope(&scope)
        .types(&filter.types)
        .tags_any(&filter.tags);
    if let Some(limit) = filter.limit {
        query = query.limit(limit);
    }
    query.fetch(db)
}

// ── search ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub scope: ScopeFilter,
    pub types: Vec<MemoryType>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            scope: ScopeFilter::All,
            types: Vec::new(),
        }
    }
}

/// Full-text or substring match on content, newest first.
///
/// A memory matches if every query term appears as an FTS5 token, or if the
/// whole query appears as a case-insensitive substring. Blank queries match
/// nothing.
pub fn search(db: &dyn Database, query: &str, opts: &SearchOptions) -> Result<Vec<Memory>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let results = ActiveQuery::new()
        .scope(&opts.scope)
        .types(&opts.types)
        .text_match(query, TermMode::All)
        .limit(opts.limit)
        .fetch(db)?;

    tracing::debug!(query, results = results.len(), "search");
    Ok(results)
}

// ── rules & context ───────────────────────────────────────────────────────────

/// Every live rule visible through `scope`. Never truncated.
pub fn get_rules(db: &dyn Database, scope: &ScopeFilter) -> Result<Vec<Memory>> {
    ActiveQuery::new()
        .scope(scope)
        .types(&[MemoryType::Rule])
        .fetch(db)
}

#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Bound on `memories`; rules are never bounded.
    pub limit: usize,
    pub scope: ScopeFilter,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CONTEXT_LIMIT,
            scope: ScopeFilter::All,
        }
    }
}

/// The recall bundle handed to prompt injection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecallContext {
    pub rules: Vec<Memory>,
    pub memories: Vec<Memory>,
}

impl RecallContext {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.memories.is_empty()
    }
}

/// Assemble rules plus relevant memories.
///
/// With a query, non-rule memories are ranked by bm25 over any query term,
/// with substring-only matches after them and recency breaking ties. Without
/// one, the most recent non-rule memories are returned. An empty `memories`
/// list is a normal outcome.
pub fn get_context(
    db: &dyn Database,
    query: Option<&str>,
    opts: &ContextOptions,
) -> Result<RecallContext> {
    let rules = get_rules(db, &opts.scope)?;

    let mut relevant = ActiveQuery::new()
        .scope(&opts.scope)
        .exclude_type(MemoryType::Rule);
    if let Some(q) = query.map(str::trim).filter(|q| !q.is_empty()) {
        relevant = relevant.text_match(q, TermMode::Any);
    }
    let memories = relevant.limit(opts.limit).fetch(db)?;

    tracing::debug!(
        rules = rules.len(),
        memories = memories.len(),
        has_query = query.is_some(),
        "context assembled"
    );
    Ok(RecallContext { rules, memories })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{open_memory_database, Statement};
    use crate::memory::forget::forget;
    use crate::memory::scope::ScopeArgs;
    use crate::memory::store::{add, AddOptions};
    use crate::memory::types::Scope;

    fn seed(
        db: &dyn Database,
        content: &str,
        memory_type: MemoryType,
        tags: &[&str],
        project: Option<&str>,
    ) -> String {
        let opts = AddOptions {
            memory_type: Some(memory_type),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            scope: match project {
                Some(p) => ScopeArgs::new(None, Some(p.into())),
                None => ScopeArgs::new(Some(true), None),
            },
            ..Default::default()
        };
        add(db, content, &opts).unwrap().into_memory().id
    }

    /// Force a deterministic creation order.
    fn set_created(db: &dyn Database, id: &str, at: &str) {
        db.execute(
            &Statement::new("UPDATE memories SET created_at = ?1 WHERE id = ?2")
                .bind(at.to_string())
                .bind(id.to_string()),
        )
        .unwrap();
    }

    #[test]
    fn test_list_newest_first_excludes_forgotten() {
        let db = open_memory_database().unwrap();
        let a = seed(db.as_ref(), "first", MemoryType::Note, &[], None);
        let b = seed(db.as_ref(), "second", MemoryType::Note, &[], None);
        let c = seed(db.as_ref(), "third", MemoryType::Note, &[], None);
        set_created(db.as_ref(), &a, "2025-01-01T00:00:00.000000Z");
        set_created(db.as_ref(), &b, "2025-01-02T00:00:00.000000Z");
        set_created(db.as_ref(), &c, "2025-01-03T00:00:00.000000Z");
        forget(db.as_ref(), &b).unwrap();

        let listed = list(db.as_ref(), &ListFilter::default()).unwrap();
        let ids: Vec<_> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![c.as_str(), a.as_str()]);
    }

    #[test]
    fn test_list_filters_by_type_tags_and_limit() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "r", MemoryType::Rule, &["style"], None);
        seed(db.as_ref(), "f", MemoryType::Fact, &["db"], None);
        seed(db.as_ref(), "n", MemoryType::Note, &["db", "tmp"], None);
        seed(db.as_ref(), "s", MemoryType::Skill, &[], None);

        let facts = list(
            db.as_ref(),
            &ListFilter {
                types: vec![MemoryType::Fact, MemoryType::Rule],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(facts.len(), 2);

        let tagged = list(
            db.as_ref(),
            &ListFilter {
                tags: vec!["style".into(), "tmp".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tagged.len(), 2);

        let limited = list(
            db.as_ref(),
            &ListFilter {
                limit: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(limited.len(), 3);
    }

    #[test]
    fn test_tag_match_is_whole_tag() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "x", MemoryType::Note, &["database"], None);
        let found = list(
            db.as_ref(),
            &ListFilter {
                tags: vec!["data".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_list_scope_isolation() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "global", MemoryType::Note, &[], None);
        seed(db.as_ref(), "web only", MemoryType::Note, &[], Some("web"));
        seed(db.as_ref(), "api only", MemoryType::Note, &[], Some("api"));

        let web = list(
            db.as_ref(),
            &ListFilter {
                scope: ScopeFilter::ProjectAndGlobal("web".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let contents: Vec<_> = web.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"global"));
        assert!(contents.contains(&"web only"));
        assert!(!contents.contains(&"api only"));

        let global = list(
            db.as_ref(),
            &ListFilter {
                global_only: true,
                scope: ScopeFilter::Project("web".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].scope, Scope::Global);
    }

    #[test]
    fn test_search_matches_terms_and_substrings() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "Use tokio for async runtime", MemoryType::Decision, &[], None);
        seed(db.as_ref(), "Prefer rusqlite over diesel", MemoryType::Fact, &[], None);

        let hits = search(db.as_ref(), "ASYNC tokio", &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("tokio"));

        // substring within a token
        let hits = search(db.as_ref(), "qlite", &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 1);

        assert!(search(db.as_ref(), "   ", &SearchOptions::default()).unwrap().is_empty());
        assert!(search(db.as_ref(), "\"", &SearchOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_search_respects_limit_and_forgotten() {
        let db = open_memory_database().unwrap();
        for i in 0..5 {
            seed(db.as_ref(), &format!("cargo tip {i}"), MemoryType::Note, &[], None);
        }
        let gone = seed(db.as_ref(), "cargo secret", MemoryType::Note, &[], None);
        forget(db.as_ref(), &gone).unwrap();

        let opts = SearchOptions {
            limit: 3,
            ..Default::default()
        };
        assert_eq!(search(db.as_ref(), "cargo", &opts).unwrap().len(), 3);
        assert!(search(db.as_ref(), "secret", &SearchOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_search_handles_fts_syntax() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "value is 50% off (NEAR) AND more", MemoryType::Note, &[], None);
        let hits = search(db.as_ref(), "50% (NEAR) AND", &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_get_rules_never_truncated() {
        let db = open_memory_database().unwrap();
        for i in 0..30 {
            seed(db.as_ref(), &format!("rule {i}"), MemoryType::Rule, &[], None);
        }
        seed(db.as_ref(), "project rule", MemoryType::Rule, &[], Some("web"));

        let opts = ContextOptions {
            limit: 1,
            scope: ScopeFilter::GlobalOnly,
        };
        let ctx = get_context(db.as_ref(), Some("unrelated"), &opts).unwrap();
        assert_eq!(ctx.rules.len(), 30);

        let web = get_rules(db.as_ref(), &ScopeFilter::ProjectAndGlobal("web".into())).unwrap();
        assert_eq!(web.len(), 31);
    }

    #[test]
    fn test_context_ranks_by_relevance() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "Always run clippy", MemoryType::Rule, &[], None);
        let weak = seed(
            db.as_ref(),
            "database notes: tables, indexes, triggers and many other words here",
            MemoryType::Note,
            &[],
            None,
        );
        let strong = seed(db.as_ref(), "database migrations database schema", MemoryType::Fact, &[], None);
        seed(db.as_ref(), "frontend uses react", MemoryType::Note, &[], None);
        set_created(db.as_ref(), &strong, "2020-01-01T00:00:00.000000Z");

        let ctx = get_context(db.as_ref(), Some("database migrations"), &ContextOptions::default()).unwrap();
        assert_eq!(ctx.rules.len(), 1);
        let ids: Vec<_> = ctx.memories.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![strong.as_str(), weak.as_str()]);
        assert!(ctx.memories.iter().all(|m| !m.is_rule()));
    }

    #[test]
    fn test_context_without_query_is_most_recent() {
        let db = open_memory_database().unwrap();
        seed(db.as_ref(), "only a rule", MemoryType::Rule, &[], None);
        let ctx = get_context(db.as_ref(), None, &ContextOptions::default()).unwrap();
        assert_eq!(ctx.rules.len(), 1);
        assert!(ctx.memories.is_empty());

        let old = seed(db.as_ref(), "old note", MemoryType::Note, &[], None);
        let new = seed(db.as_ref(), "new note", MemoryType::Note, &[], None);
        set_created(db.as_ref(), &old, "2020-01-01T00:00:00.000000Z");

        let opts = ContextOptions {
            limit: 1,
            ..Default::default()
        };
        let ctx = get_context(db.as_ref(), None, &opts).unwrap();
        assert_eq!(ctx.memories.len(), 1);
        assert_eq!(ctx.memories[0].id, new);
    }
}
