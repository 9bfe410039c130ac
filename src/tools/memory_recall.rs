//! MCP `memory_recall` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_recall` MCP tool.
///
/// Returns every applicable rule plus the memories most relevant to `query`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryRecallParams {
    /// Free text describing the task at hand. Without it the most recent
    /// memories are returned.
    #[schemars(description = "What you are working on. Omit to get the most recent memories.")]
    pub query: Option<String>,

    /// Bound on non-rule memories. Rules are never truncated.
    #[schemars(description = "Maximum number of non-rule memories. Defaults to 10. Rules are always included.")]
    pub limit: Option<usize>,

    #[schemars(description = "Recall global memories only")]
    pub global: Option<bool>,

    #[schemars(description = "Recall this project's memories plus global ones")]
    pub project_id: Option<String>,
}
