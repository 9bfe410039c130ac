use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryAddParams {
    #[schemars(description = "The natural language content of the memory")]
    pub content: String,

    #[schemars(
        description = "Memory type: 'rule' (always injected), 'decision', 'fact', 'note' (default), or 'skill'"
    )]
    pub r#type: Option<String>,

    #[schemars(description = "Optional tags for filtering")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Optional glob patterns of files this memory relates to")]
    pub paths: Option<Vec<String>>,

    #[schemars(description = "Optional free-form category")]
    pub category: Option<String>,

    #[schemars(description = "Store globally, visible to every project. Cannot be combined with project_id.")]
    pub global: Option<bool>,

    #[schemars(description = "Project this memory belongs to. Defaults to the configured project, else global.")]
    pub project_id: Option<String>,
}
