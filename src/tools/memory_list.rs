//! MCP `memory_list` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_list` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryListParams {
    #[schemars(description = "Filter by memory type: 'rule', 'decision', 'fact', 'note', 'skill'")]
    pub r#type: Option<String>,

    /// OR-matched: a memory with any one of these tags qualifies.
    #[schemars(description = "Only memories carrying at least one of these tags")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Maximum number of results to return. Defaults to 50.")]
    pub limit: Option<usize>,

    #[schemars(description = "List global memories only")]
    pub global: Option<bool>,

    #[schemars(description = "List this project's memories plus global ones")]
    pub project_id: Option<String>,
}
