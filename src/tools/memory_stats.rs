//! MCP `memory_stats` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `memory_stats` MCP tool.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct MemoryStatsParams {
    /// Include the health check result in the response.
    #[schemars(description = "Run storage health checks now and include the findings (default: false)")]
    pub check_health: Option<bool>,
}
