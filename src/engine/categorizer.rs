use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::database::store::ActivityStore;
use crate::history::resolver;
use crate::llm::failover::FailoverRouter;
use crate::llm::parsing::CategoryChoice;
use crate::llm::prompts::CategoryOption;
use crate::models::activity::{ActivitySnapshot, CategorizationResult};
use crate::redaction::redactor::redact_activity_details;

/// Activity blocks longer than this with a weak explanation get a second,
/// summarization-only call to upgrade the reasoning text.
pub const LONG_BLOCK_MS: i64 = 10 * 60 * 1000;
const MIN_REASONING_CHARS: usize = 10;

/// The decision engine's view of the LLM side. Production wires in the
/// failover router; tests substitute a scripted oracle.
#[async_trait]
pub trait CategoryOracle: Send + Sync {
    async fn choose_category(
        &self,
        goals: &str,
        categories: &[CategoryOption],
        snapshot: &ActivitySnapshot,
    ) -> Option<CategoryChoice>;

    async fn summarize_block(&self, snapshot: &ActivitySnapshot) -> Option<String>;
}

#[async_trait]
impl CategoryOracle for FailoverRouter {
    async fn choose_category(
        &self,
        goals: &str,
        categories: &[CategoryOption],
        snapshot: &ActivitySnapshot,
    ) -> Option<CategoryChoice> {
        FailoverRouter::choose_category(self, goals, categories, snapshot).await
    }

    async fn summarize_block(&self, snapshot: &ActivitySnapshot) -> Option<String> {
        FailoverRouter::summarize_block(self, snapshot).await
    }
}

/// Orchestrates one categorization: multi-purpose check, history lookup,
/// redaction, LLM decision, response validation, optional reasoning
/// upgrade. Failures in here are never surfaced to the tracking loop; the
/// worst outcome is an all-null result for this tick.
pub struct Categorizer {
    store: Arc<dyn ActivityStore>,
    oracle: Arc<dyn CategoryOracle>,
}

impl Categorizer {
    pub fn new(store: Arc<dyn ActivityStore>, oracle: Arc<dyn CategoryOracle>) -> Self {
        Self { store, oracle }
    }

    pub async fn categorize(
        &self,
        user_id: &str,
        snapshot: &ActivitySnapshot,
    ) -> Result<CategorizationResult> {
        let profile = self
            .store
            .user_profile(user_id)
            .await?
            .unwrap_or_default();

        // History short-circuit. A hit carries the stored reasoning but
        // never a summary.
        if let Some(hit) = resolver::resolve(self.store.as_ref(), user_id, &profile, snapshot).await? {
            log::debug!("history hit for user {}: {}", user_id, hit.category_id);
            return Ok(CategorizationResult {
                category_id: Some(hit.category_id),
                category_reasoning: hit.category_reasoning,
                llm_summary: None,
            });
        }

        let categories = self.store.categories(user_id).await?;
        if categories.is_empty() {
            // Nothing to choose from. Expected for fresh accounts.
            return Ok(CategorizationResult::empty());
        }

        let redacted = redact_activity_details(snapshot);
        let options = CategoryOption::from_categories(&categories);

        let choice = match self
            .oracle
            .choose_category(&profile.user_projects_and_goals, &options, &redacted)
            .await
        {
            Some(choice) => choice,
            None => {
                log::warn!("no categorization possible for user {} this tick", user_id);
                return Ok(CategorizationResult::empty());
            }
        };

        // Map the chosen name back to an id: case-insensitive, exact,
        // first match in creation order. Never guess a closest category.
        let mut result = match categories
            .iter()
            .find(|c| c.name.to_lowercase() == choice.chosen_category_name.to_lowercase())
        {
            Some(category) => CategorizationResult {
                category_id: Some(category.id.clone()),
                category_reasoning: choice.reasoning.clone(),
                llm_summary: choice.summary.clone(),
            },
            None => {
                log::warn!(
                    "model chose unknown category '{}' for user {}, leaving uncategorized",
                    choice.chosen_category_name,
                    user_id
                );
                CategorizationResult::empty()
            }
        };

        // Long blocks deserve a real explanation. The category decision
        // stays as-is; only the reasoning text is upgraded.
        let duration_ms = snapshot.duration_ms.unwrap_or(0);
        let weak_reasoning = choice
            .reasoning
            .as_deref()
            .map(|r| r.chars().count() < MIN_REASONING_CHARS)
            .unwrap_or(true);
        if duration_ms > LONG_BLOCK_MS && weak_reasoning {
            if let Some(summary) = self.oracle.summarize_block(&redacted).await {
                result.category_reasoning = Some(summary);
            }
        }

        Ok(result)
    }
}
