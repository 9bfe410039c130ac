//! Shared read-path query builder.
//!
//! Every read of `memories` goes through [`ActiveQuery`], which starts from the
//! `deleted_at IS NULL` predicate and only ever adds conditions to it. New read
//! paths get soft-delete filtering by construction.

use crate::db::{Database, Row, Statement, Value};
use crate::error::Result;
use crate::memory::scope::ScopeFilter;
use crate::memory::types::{decode_tags, canonical_tags, Memory, MemoryType, Scope};

/// Column list for `SELECT`s through the builder (qualified for FTS joins).
const SELECT_COLUMNS: &str = "memories.id, memories.content, memories.type, memories.scope, \
     memories.project_id, memories.tags, memories.category, memories.paths, \
     memories.embedding IS NOT NULL, memories.created_at, memories.updated_at";

/// Same columns, unqualified, for `RETURNING` clauses on writes.
pub(crate) const RETURNING_COLUMNS: &str = "id, content, type, scope, project_id, tags, \
     category, paths, embedding IS NOT NULL, created_at, updated_at";

/// Decode a row produced by [`SELECT_COLUMNS`] or [`RETURNING_COLUMNS`].
pub(crate) fn memory_from_row(row: &Row) -> Result<Memory> {
    let paths: Vec<String> = match row.opt_text(7)? {
        Some(json) if !json.is_empty() => serde_json::from_str(&json)?,
        _ => Vec::new(),
    };

    Ok(Memory {
        id: row.text(0)?,
        content: row.text(1)?,
        memory_type: row.text(2)?.parse()?,
        scope: Scope::from_columns(&row.text(3)?, row.opt_text(4)?)?,
        tags: decode_tags(&row.opt_text(5)?.unwrap_or_default()),
        category: row.opt_text(6)?,
        paths,
        has_embedding: row.integer(8)? != 0,
        created_at: row.text(9)?,
        updated_at: row.text(10)?,
    })
}

/// How free-text terms combine in the FTS match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMode {
    /// Every term must appear (search).
    All,
    /// Any term may appear; bm25 ranks the rest (context assembly).
    Any,
}

/// Builder for reads over live memories.
#[derive(Debug, Clone)]
pub struct ActiveQuery {
    join: Option<(String, Vec<Value>)>,
    conditions: Vec<String>,
    args: Vec<Value>,
    order: &'static str,
    limit: Option<usize>,
}

const ORDER_NEWEST: &str = "memories.created_at DESC, memories.seq DESC";
const ORDER_RELEVANCE: &str =
    "fts.fts_rank IS NULL, fts.fts_rank, memories.created_at DESC, memories.seq DESC";

impl Default for ActiveQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl ActiveQuery {
    pub fn new() -> Self {
        Self {
            join: None,
            conditions: vec!["memories.deleted_at IS NULL".to_string()],
            args: Vec::new(),
            order: ORDER_NEWEST,
            limit: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.conditions.push("memories.id = ?".into());
        self.args.push(Value::Text(id.to_string()));
        self
    }

    pub fn scope(mut self, filter: &ScopeFilter) -> Self {
        match filter {
            ScopeFilter::All => {}
            ScopeFilter::GlobalOnly => self.conditions.push("memories.scope = 'global'".into()),
            ScopeFilter::Project(id) => {
                self.conditions
                    .push("(memories.scope = 'project' AND memories.project_id = ?)".into());
                self.args.push(Value::Text(id.clone()));
            }
            ScopeFilter::ProjectAndGlobal(id) => {
                self.conditions.push(
                    "(memories.scope = 'global' OR (memories.scope = 'project' AND memories.project_id = ?))"
                        .into(),
                );
                self.args.push(Value::Text(id.clone()));
            }
        }
        self
    }

    /// Restrict to the given types. An empty slice means no restriction.
    pub fn types(mut self, types: &[MemoryType]) -> Self {
        if types.is_empty() {
            return self;
        }
        let placeholders = vec!["?"; types.len()].join(", ");
        self.conditions
            .push(format!("memories.type IN ({placeholders})"));
        self.args
            .extend(types.iter().map(|t| Value::Text(t.as_str().to_string())));
        self
    }

    pub fn exclude_type(mut self, memory_type: MemoryType) -> Self {
        self.conditions.push("memories.type <> ?".into());
        self.args.push(Value::Text(memory_type.as_str().to_string()));
        self
    }

    /// Match memories carrying at least one of `tags`.
    pub fn tags_any<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        let tags = canonical_tags(tags);
        if tags.is_empty() {
            return self;
        }
        let clauses = vec!["(',' || memories.tags || ',') LIKE ? ESCAPE '\\'"; tags.len()];
        self.conditions.push(format!("({})", clauses.join(" OR ")));
        self.args.extend(
            tags.iter()
                .map(|t| Value::Text(format!("%,{},%", escape_like(t)))),
        );
        self
    }

    /// Exact match on the dedup key.
    pub fn normalized_content(mut self, norm: &str) -> Self {
        self.conditions.push("memories.content_norm = ?".into());
        self.args.push(Value::Text(norm.to_string()));
        self
    }

    /// Case-insensitive substring match on content.
    pub fn content_contains(mut self, needle: &str) -> Self {
        self.conditions
            .push("memories.content LIKE ? ESCAPE '\\'".into());
        self.args
            .push(Value::Text(format!("%{}%", escape_like(needle))));
        self
    }

    /// Full-text match (FTS5 terms) or whole-query substring match.
    ///
    /// Also switches ordering to relevance-first when `mode` is [`TermMode::Any`].
    pub fn text_match(mut self, query: &str, mode: TermMode) -> Self {
        let fts_query = fts_expression(query, mode);
        let like = Value::Text(format!("%{}%", escape_like(query.trim())));

        if fts_query.is_empty() {
            self.conditions
                .push("memories.content LIKE ? ESCAPE '\\'".into());
            self.args.push(like);
            return self;
        }

        self.join = Some((
            "LEFT JOIN (SELECT rowid AS fts_rowid, rank AS fts_rank FROM memories_fts \
             WHERE memories_fts MATCH ?) fts ON fts.fts_rowid = memories.seq"
                .into(),
            vec![Value::Text(fts_query)],
        ));
        self.conditions.push(
            "(fts.fts_rowid IS NOT NULL OR memories.content LIKE ? ESCAPE '\\')".into(),
        );
        self.args.push(like);
        if mode == TermMode::Any {
            self.order = ORDER_RELEVANCE;
        }
        self
    }

    /// Only rows still waiting for an embedding.
    pub fn pending_embedding(mut self) -> Self {
        self.conditions.push("memories.embedding IS NULL".into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn from_where(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("FROM memories");
        let mut args = Vec::new();
        if let Some((join, join_args)) = &self.join {
            sql.push(' ');
            sql.push_str(join);
            args.extend(join_args.iter().cloned());
        }
        sql.push_str(" WHERE ");
        sql.push_str(&self.conditions.join(" AND "));
        args.extend(self.args.iter().cloned());
        (sql, args)
    }

    pub fn build(&self) -> Statement {
        let (from_where, mut args) = self.from_where();
        let mut sql = format!("SELECT {SELECT_COLUMNS} {from_where} ORDER BY {}", self.order);
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(limit as i64));
        }
        Statement { sql, args }
    }

    pub fn fetch(&self, db: &dyn Database) -> Result<Vec<Memory>> {
        let stmt = self.build();
        tracing::debug!(sql = %stmt.sql, args = stmt.args.len(), "memory query");
        db.execute(&stmt)?
            .rows
            .iter()
            .map(memory_from_row)
            .collect()
    }

    pub fn fetch_one(&self, db: &dyn Database) -> Result<Option<Memory>> {
        Ok(self.clone().limit(1).fetch(db)?.into_iter().next())
    }

    pub fn count(&self, db: &dyn Database) -> Result<u64> {
        let (from_where, args) = self.from_where();
        let stmt = Statement {
            sql: format!("SELECT COUNT(*) {from_where}"),
            args,
        };
        Ok(db.execute(&stmt)?.scalar_i64()? as u64)
    }
}

/// Escape `%`, `_`, and `\` for a `LIKE … ESCAPE '\'` pattern.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Build an FTS5 MATCH expression from free text.
///
/// Each whitespace-delimited word is quoted so FTS5 treats it as a plain term;
/// words with no alphanumerics are dropped. Terms are joined by implicit AND
/// or by `OR`.
pub(crate) fn fts_expression(query: &str, mode: TermMode) -> String {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .map(|w| format!("\"{w}\""))
        .collect();
    let sep = match mode {
        TermMode::All => " ",
        TermMode::Any => " OR ",
    };
    terms.join(sep)
}
