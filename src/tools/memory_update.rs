use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryUpdateParams {
    #[schemars(description = "ID of the memory to update")]
    pub id: String,

    #[schemars(description = "Replacement content")]
    pub content: Option<String>,

    #[schemars(description = "Replacement memory type")]
    pub r#type: Option<String>,

    #[schemars(description = "Replacement tag set")]
    pub tags: Option<Vec<String>>,
}
