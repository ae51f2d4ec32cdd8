use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::PgPool as Pool;

use crate::database::store::{ActivityStore, IdentityQuery};
use crate::models::activity::HistoricalEvent;
use crate::models::category::{Category, UserProfile};

const EVENT_COLUMNS: &str =
    "owner_name, title, url, category_id, category_reasoning, timestamp";
const CATEGORY_COLUMNS: &str =
    "id, user_id, name, description, color, is_productive, is_default";

pub struct Database {
    pool: Pool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn create_tables(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                color TEXT NOT NULL DEFAULT '#808080',
                is_productive BOOLEAN NOT NULL DEFAULT FALSE,
                is_default BOOLEAN,
                is_archived BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                user_projects_and_goals TEXT NOT NULL DEFAULT '',
                multi_purpose_apps TEXT[] NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS activity_events (
                id SERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                owner_name TEXT,
                title TEXT,
                url TEXT,
                category_id TEXT,
                category_reasoning TEXT,
                timestamp TIMESTAMP WITH TIME ZONE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Add category_reasoning column if it doesn't exist (for migration)
        sqlx::query(
            r#"
            ALTER TABLE activity_events ADD COLUMN IF NOT EXISTS category_reasoning TEXT
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ActivityStore for Database {
    async fn categories(&self, user_id: &str) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE user_id = $1 AND is_archived = FALSE ORDER BY created_at, id",
            CATEGORY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn category_by_id(&self, id: &str) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM categories WHERE id = $1",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT user_projects_and_goals, multi_purpose_apps FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn latest_event(
        &self,
        user_id: &str,
        query: &IdentityQuery,
    ) -> Result<Option<HistoricalEvent>> {
        let event = match query {
            IdentityQuery::Url(url) => {
                sqlx::query_as::<_, HistoricalEvent>(&format!(
                    "SELECT {} FROM activity_events WHERE user_id = $1 AND url = $2 ORDER BY timestamp DESC LIMIT 1",
                    EVENT_COLUMNS
                ))
                .bind(user_id)
                .bind(url)
                .fetch_optional(&self.pool)
                .await?
            }
            IdentityQuery::OwnerTitle { owner, title } => {
                sqlx::query_as::<_, HistoricalEvent>(&format!(
                    "SELECT {} FROM activity_events WHERE user_id = $1 AND owner_name = $2 AND title = $3 ORDER BY timestamp DESC LIMIT 1",
                    EVENT_COLUMNS
                ))
                .bind(user_id)
                .bind(owner)
                .bind(title)
                .fetch_optional(&self.pool)
                .await?
            }
            IdentityQuery::OwnerProject { owner, project } => {
                // Any title ending in "— <project>" counts as the same project.
                let suffix = format!(
                    "%\u{2014} {}",
                    project
                        .replace('\\', "\\\\")
                        .replace('%', "\\%")
                        .replace('_', "\\_")
                );
                sqlx::query_as::<_, HistoricalEvent>(&format!(
                    "SELECT {} FROM activity_events WHERE user_id = $1 AND owner_name = $2 AND title ILIKE $3 ORDER BY timestamp DESC LIMIT 1",
                    EVENT_COLUMNS
                ))
                .bind(user_id)
                .bind(owner)
                .bind(suffix)
                .fetch_optional(&self.pool)
                .await?
            }
            IdentityQuery::Owner(owner) => {
                sqlx::query_as::<_, HistoricalEvent>(&format!(
                    "SELECT {} FROM activity_events WHERE user_id = $1 AND owner_name = $2 ORDER BY timestamp DESC LIMIT 1",
                    EVENT_COLUMNS
                ))
                .bind(user_id)
                .bind(owner)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(event)
    }
}
