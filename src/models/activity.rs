use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// What kind of foreground surface produced the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Window,
    Browser,
}

/// One sampled observation of the user's current foreground activity.
/// Ephemeral: produced by the sampling daemon each tick, categorized here,
/// persisted by the caller afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySnapshot {
    pub owner_name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub browser: Option<String>,
    pub duration_ms: Option<i64>,
}

/// A previously categorized snapshot as stored by the activity-event store.
/// Read-only here: used for identity lookups, never mutated.
#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEvent {
    pub owner_name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub category_id: Option<String>,
    pub category_reasoning: Option<String>,
    pub timestamp: DateTime<Local>,
}

/// Final outcome of categorizing one snapshot. A null `category_id` is a
/// valid, expected result (no categories defined, or no confident match).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationResult {
    pub category_id: Option<String>,
    pub category_reasoning: Option<String>,
    pub llm_summary: Option<String>,
}

impl CategorizationResult {
    pub fn empty() -> Self {
        Self {
            category_id: None,
            category_reasoning: None,
            llm_summary: None,
        }
    }
}
