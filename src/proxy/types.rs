//! OpenAI-compatible model catalog types.

use serde::{Deserialize, Serialize};

/// Response body of `GET /v1/models`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

/// A single model in the catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
    pub permission: Vec<ModelPermission>,
    pub root: String,
    pub parent: Option<String>,
}

/// Permission metadata attached to a model entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelPermission {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub allow_create_engine: bool,
    pub allow_sampling: bool,
    pub allow_logprobs: bool,
    pub allow_search_indices: bool,
    pub allow_view: bool,
    pub allow_fine_tuning: bool,
    pub organization: String,
    pub group: Option<String>,
    pub is_blocking: bool,
}

impl ModelList {
    /// The fixed catalog advertised to clients.
    pub fn catalog() -> Self {
        Self {
            object: "list".to_string(),
            data: vec![ModelEntry {
                id: "gpt-3.5-turbo".to_string(),
                object: "model".to_string(),
                created: 1677610602,
                owned_by: "openai".to_string(),
                permission: vec![ModelPermission {
                    id: "modelperm-M56FXnG1AsIr3SXq8BYPvXJA".to_string(),
                    object: "model_permission".to_string(),
                    created: 1679602088,
                    allow_create_engine: false,
                    allow_sampling: true,
                    allow_logprobs: true,
                    allow_search_indices: false,
                    allow_view: true,
                    allow_fine_tuning: false,
                    organization: "*".to_string(),
                    group: None,
                    is_blocking: false,
                }],
                root: "gpt-3.5-turbo".to_string(),
                parent: None,
            }],
        }
    }
}
