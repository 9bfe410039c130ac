use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Forget by id, by a list of ids, or by filter.
///
/// A filter alone only previews candidates; `confirm: true` forgets them.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryForgetParams {
    #[schemars(description = "ID of a single memory to forget")]
    pub id: Option<String>,

    #[schemars(description = "IDs of several memories to forget at once")]
    pub ids: Option<Vec<String>>,

    #[schemars(description = "Filter candidates by memory type")]
    pub r#type: Option<String>,

    #[schemars(description = "Filter candidates carrying any of these tags")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Filter candidates whose content contains this text")]
    pub content_contains: Option<String>,

    #[schemars(description = "Forget the filtered candidates instead of previewing them (default: false)")]
    pub confirm: Option<bool>,

    #[schemars(description = "Maximum number of candidates. Defaults to 50.")]
    pub limit: Option<usize>,

    #[schemars(description = "Restrict the filter to global memories")]
    pub global: Option<bool>,

    #[schemars(description = "Restrict the filter to this project's memories")]
    pub project_id: Option<String>,
}
