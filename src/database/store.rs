use anyhow::Result;
use async_trait::async_trait;

use crate::models::activity::HistoricalEvent;
use crate::models::category::{Category, UserProfile};

/// Identity query shapes for the history lookup, most specific first.
/// Which shape applies is decided by the history resolver; the store only
/// has to translate it into a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityQuery {
    /// Exact URL match (browser snapshots with a URL).
    Url(String),
    /// Exact (owner, title) match (browser snapshots without a URL).
    OwnerTitle { owner: String, title: String },
    /// Code-editor owner plus any title ending in the same project suffix,
    /// i.e. any file within the same project.
    OwnerProject { owner: String, project: String },
    /// Owner name only.
    Owner(String),
}

/// Narrow read-only interface over the external category / profile /
/// activity-event stores. The production implementation is Postgres; tests
/// use an in-memory fake.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Non-archived categories for a user, in creation order.
    async fn categories(&self, user_id: &str) -> Result<Vec<Category>>;

    /// Existence re-check for a single category id.
    async fn category_by_id(&self, id: &str) -> Result<Option<Category>>;

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Most recent historical event matching the identity query.
    async fn latest_event(
        &self,
        user_id: &str,
        query: &IdentityQuery,
    ) -> Result<Option<HistoricalEvent>>;
}
