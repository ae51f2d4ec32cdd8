use serde::{Deserialize, Serialize};

/// A user-defined activity category. Owned by the category service; the
/// categorization core only ever reads these.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_productive: bool,
    pub is_default: Option<bool>,
}

/// Per-user settings consumed by the pipeline. `multi_purpose_apps` lists
/// app names that must never be trusted from history (forces a fresh LLM
/// decision every occurrence).
#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_projects_and_goals: String,
    pub multi_purpose_apps: Vec<String>,
}
