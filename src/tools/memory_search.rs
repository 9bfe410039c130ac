//! MCP `memory_search` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_search` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemorySearchParams {
    /// Words to match against memory content.
    #[schemars(description = "Words to search for. Every word must match, or the whole query as a substring.")]
    pub query: String,

    /// Restrict to one memory type.
    #[schemars(description = "Filter by memory type: 'rule', 'decision', 'fact', 'note', 'skill'")]
    pub r#type: Option<String>,

    /// Maximum number of results. Defaults to the configured search limit.
    #[schemars(description = "Maximum number of results to return. Defaults to 20.")]
    pub limit: Option<usize>,

    #[schemars(description = "Search global memories only")]
    pub global: Option<bool>,

    #[schemars(description = "Search this project's memories plus global ones")]
    pub project_id: Option<String>,
}
