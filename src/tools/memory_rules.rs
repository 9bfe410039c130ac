use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryRulesParams {
    #[schemars(description = "Global rules only")]
    pub global: Option<bool>,

    #[schemars(description = "This project's rules plus global ones")]
    pub project_id: Option<String>,
}
