pub mod memory_add;
pub mod memory_forget;
pub mod memory_list;
pub mod memory_recall;
pub mod memory_rules;
pub mod memory_search;
pub mod memory_stats;
pub mod memory_update;

use memory_add::MemoryAddParams;
use memory_forget::MemoryForgetParams;
use memory_list::MemoryListParams;
use memory_recall::MemoryRecallParams;
use memory_rules::MemoryRulesParams;
use memory_search::MemorySearchParams;
use memory_stats::MemoryStatsParams;
use memory_update::MemoryUpdateParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use serde::Serialize;
use std::sync::Arc;

use crate::config::CairnConfig;
use crate::db::Database;
use crate::error::{MemoryError, Result as EngineResult};
use crate::memory::forget::{bulk_forget_by_ids, find_to_forget, forget, ForgetFilter};
use crate::memory::health::{append_warnings, HealthMonitor};
use crate::memory::search::{get_context, get_rules, list, search, ContextOptions, ListFilter, SearchOptions};
use crate::memory::stats::memory_stats;
use crate::memory::store::{add, update, AddOptions, UpdateChanges};
use crate::memory::{resolve_scope, MemoryType, ScopeArgs, ScopeFilter};

/// The cairn MCP tool handler. Holds the shared database handle, config, and
/// health monitor, and exposes every tool via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct CairnTools {
    tool_router: ToolRouter<Self>,
    db: Arc<dyn Database>,
    config: Arc<CairnConfig>,
    health: Arc<HealthMonitor>,
}

#[tool_router]
impl CairnTools {
    pub fn new(db: Arc<dyn Database>, config: Arc<CairnConfig>, health: Arc<HealthMonitor>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            config,
            health,
        }
    }

    /// Store a new memory, or return the existing one if it is a duplicate.
    #[tool(description = "Store a memory. Types: rule (always recalled), decision, fact, note, skill. Duplicate content in the same scope returns the existing memory.")]
    async fn memory_add(
        &self,
        Parameters(params): Parameters<MemoryAddParams>,
    ) -> Result<String, String> {
        tracing::info!(content_len = params.content.len(), "memory_add called");

        self.run("add", move |db, config| {
            let opts = AddOptions {
                memory_type: parse_type(params.r#type.as_deref())?,
                tags: params.tags.unwrap_or_default(),
                paths: params.paths.unwrap_or_default(),
                category: params.category,
                scope: ScopeArgs::new(params.global, params.project_id),
                default_project: config.default_project().map(str::to_string),
            };
            let outcome = add(db, &params.content, &opts)?;
            to_json(&outcome)
        })
        .await
    }

    #[tool(description = "Search memories by keyword. Every word must match, or the whole query as a substring. Newest first.")]
    async fn memory_search(
        &self,
        Parameters(params): Parameters<MemorySearchParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "memory_search called");

        self.run("search", move |db, config| {
            let opts = SearchOptions {
                limit: params.limit.unwrap_or(config.retrieval.search_limit),
                scope: read_scope(params.global, params.project_id, config)?,
                types: parse_type(params.r#type.as_deref())?.into_iter().collect(),
            };
            let memories = search(db, &params.query, &opts)?;
            to_json(&serde_json::json!({ "total": memories.len(), "memories": memories }))
        })
        .await
    }

    #[tool(description = "List memories newest first, optionally filtered by type and tags.")]
    async fn memory_list(
        &self,
        Parameters(params): Parameters<MemoryListParams>,
    ) -> Result<String, String> {
        tracing::info!("memory_list called");

        self.run("list", move |db, config| {
            let filter = ListFilter {
                limit: Some(params.limit.unwrap_or(config.retrieval.list_limit)),
                types: parse_type(params.r#type.as_deref())?.into_iter().collect(),
                tags: params.tags.unwrap_or_default(),
                global_only: false,
                scope: read_scope(params.global, params.project_id, config)?,
            };
            let memories = list(db, &filter)?;
            to_json(&serde_json::json!({ "total": memories.len(), "memories": memories }))
        })
        .await
    }

    /// Forget by id, by ids, or by filter. A filter without `confirm` only
    /// previews what would be forgotten.
    #[tool(description = "Forget memories by id, by a list of ids, or by filter (type, tags, content_contains). A filter only previews candidates unless confirm=true.")]
    async fn memory_forget(
        &self,
        Parameters(params): Parameters<MemoryForgetParams>,
    ) -> Result<String, String> {
        tracing::info!(id = ?params.id, "memory_forget called");

        self.run("forget", move |db, config| {
            if let Some(id) = params.id.as_deref() {
                let forgotten = forget(db, id)?;
                return to_json(&serde_json::json!({ "id": id, "forgotten": forgotten }));
            }
            if let Some(ids) = params.ids.as_deref() {
                let forgotten = bulk_forget_by_ids(db, ids)?;
                return to_json(&serde_json::json!({ "requested": ids.len(), "forgotten": forgotten }));
            }

            let filter = ForgetFilter {
                types: parse_type(params.r#type.as_deref())?.into_iter().collect(),
                tags: params.tags.unwrap_or_default(),
                scope: forget_scope(params.global, params.project_id)?,
                content_contains: params.content_contains,
                limit: Some(params.limit.unwrap_or(config.retrieval.list_limit)),
            };
            if filter.is_unrestricted() {
                return Err(MemoryError::validation(
                    "provide id, ids, or at least one filter (type, tags, content_contains)",
                ));
            }

            let candidates = find_to_forget(db, &filter)?;
            if !params.confirm.unwrap_or(false) {
                return to_json(&serde_json::json!({
                    "candidates": candidates,
                    "message": "preview only; call again with confirm=true to forget these"
                }));
            }
            let ids: Vec<String> = candidates.into_iter().map(|m| m.id).collect();
            let forgotten = bulk_forget_by_ids(db, &ids)?;
            to_json(&serde_json::json!({ "requested": ids.len(), "forgotten": forgotten }))
        })
        .await
    }

    /// Rules plus the memories most relevant to a query.
    #[tool(description = "Recall context for a task: every applicable rule plus the most relevant memories. Call this at the start of a task.")]
    async fn memory_recall(
        &self,
        Parameters(params): Parameters<MemoryRecallParams>,
    ) -> Result<String, String> {
        tracing::info!(query = ?params.query, "memory_recall called");

        self.run("recall", move |db, config| {
            let opts = ContextOptions {
                limit: params.limit.unwrap_or(config.retrieval.context_limit),
                scope: read_scope(params.global, params.project_id, config)?,
            };
            let ctx = get_context(db, params.query.as_deref(), &opts)?;
            to_json(&ctx)
        })
        .await
    }

    #[tool(description = "Update a memory's content, type, or tags. Returns null if the memory does not exist or was forgotten.")]
    async fn memory_update(
        &self,
        Parameters(params): Parameters<MemoryUpdateParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "memory_update called");

        self.run("update", move |db, _config| {
            let changes = UpdateChanges {
                content: params.content,
                memory_type: parse_type(params.r#type.as_deref())?,
                tags: params.tags,
            };
            let updated = update(db, &params.id, &changes)?;
            to_json(&updated)
        })
        .await
    }

    #[tool(description = "List every rule that applies in a scope. Rules are never truncated.")]
    async fn memory_rules(
        &self,
        Parameters(params): Parameters<MemoryRulesParams>,
    ) -> Result<String, String> {
        tracing::info!("memory_rules called");

        self.run("rules", move |db, config| {
            let scope = read_scope(params.global, params.project_id, config)?;
            let rules = get_rules(db, &scope)?;
            to_json(&serde_json::json!({ "total": rules.len(), "rules": rules }))
        })
        .await
    }

    #[tool(description = "Get memory store statistics: totals, soft-deleted backlog, counts by type and scope.")]
    async fn memory_stats(
        &self,
        Parameters(params): Parameters<MemoryStatsParams>,
    ) -> Result<String, String> {
        tracing::info!("memory_stats called");

        if params.check_health.unwrap_or(false) {
            self.health.invalidate();
        }
        self.run("stats", |db, _config| to_json(&memory_stats(db)?)).await
    }
}

impl CairnTools {
    /// Run `work` on the blocking pool and map errors to text. Only a
    /// successful, non-empty response consults the health monitor.
    async fn run<F>(&self, action: &'static str, work: F) -> Result<String, String>
    where
        F: FnOnce(&dyn Database, &CairnConfig) -> EngineResult<String> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);
        let health = Arc::clone(&self.health);

        tokio::task::spawn_blocking(move || {
            match work(db.as_ref(), &config) {
                Ok(text) if !text.trim().is_empty() => {
                    append_warnings(Ok(text), &health.warnings(db.as_ref()))
                }
                Ok(text) => Ok(text),
                Err(e) => {
                    tracing::warn!(action, error = %e, "tool call failed");
                    Err(format!("{action} failed: {e}"))
                }
            }
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
    }
}

#[tool_handler]
impl ServerHandler for CairnTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "cairn keeps durable memories for coding agents. Call memory_recall at the start \
                 of a task, memory_add to save rules, decisions, facts, notes and skills, and \
                 memory_forget to drop ones that no longer hold."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

fn parse_type(raw: Option<&str>) -> EngineResult<Option<MemoryType>> {
    raw.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::parse::<MemoryType>)
        .transpose()
}

/// Read filter for tool arguments, defaulting to the configured project.
fn read_scope(
    global: Option<bool>,
    project_id: Option<String>,
    config: &CairnConfig,
) -> EngineResult<ScopeFilter> {
    let intent = resolve_scope(&ScopeArgs::new(global, project_id))?;
    Ok(intent.read_filter(config.default_project()))
}

/// Forget filters match the named scope exactly; unscoped means every scope.
fn forget_scope(global: Option<bool>, project_id: Option<String>) -> EngineResult<ScopeFilter> {
    use crate::memory::ScopeIntent;

    Ok(match resolve_scope(&ScopeArgs::new(global, project_id))? {
        ScopeIntent::Unscoped => ScopeFilter::All,
        ScopeIntent::Global => ScopeFilter::GlobalOnly,
        ScopeIntent::Project(id) => ScopeFilter::Project(id),
    })
}

fn to_json<T: Serialize>(value: &T) -> EngineResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
