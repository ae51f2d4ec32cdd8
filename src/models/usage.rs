use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One provider attempt, success or failure. Failed attempts carry zero
/// token counts when the cost is unknown but still bump request/failure
/// counters so failure rates stay visible in the rollups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub timestamp: DateTime<Local>,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub endpoint: String,
    pub success: bool,
}

impl TokenUsageRecord {
    /// Day key used by the per-day rollups.
    pub fn day_key(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }
}

/// Aggregate counters shared by the per-model and per-endpoint breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub requests: i64,
}

impl TokenTotals {
    pub fn add_record(&mut self, record: &TokenUsageRecord) {
        self.prompt_tokens += record.prompt_tokens;
        self.completion_tokens += record.completion_tokens;
        self.total_tokens += record.total_tokens;
        self.requests += 1;
    }

    pub fn add_totals(&mut self, other: &TokenTotals) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
        self.requests += other.requests;
    }
}

/// One day of usage with by-model and by-endpoint breakdowns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub requests: i64,
    pub failures: i64,
    #[serde(default)]
    pub by_model: BTreeMap<String, TokenTotals>,
    #[serde(default)]
    pub by_endpoint: BTreeMap<String, TokenTotals>,
}

impl DayUsage {
    pub fn add_record(&mut self, record: &TokenUsageRecord) {
        self.prompt_tokens += record.prompt_tokens;
        self.completion_tokens += record.completion_tokens;
        self.total_tokens += record.total_tokens;
        self.requests += 1;
        if !record.success {
            self.failures += 1;
        }
        self.by_model
            .entry(record.model.clone())
            .or_default()
            .add_record(record);
        self.by_endpoint
            .entry(record.endpoint.clone())
            .or_default()
            .add_record(record);
    }
}

/// The persisted rollup document, rewritten on each flush. `models` holds
/// all-time per-model totals; older files carried only `days`, in which
/// case the per-model table is reconstructed once on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsageStats {
    #[serde(default)]
    pub days: BTreeMap<String, DayUsage>,
    #[serde(default)]
    pub models: BTreeMap<String, TokenTotals>,
}
