use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::domain::campaign::{CampaignEntry, CampaignProgress};
use crate::domain::category::SearchData;
use crate::domain::search::PersistedSearch;

/// Persistence gateway for search rows. Every operation is scoped by the
/// owning user; writes are last-writer-wins.
#[async_trait]
pub trait SearchStore: Send + Sync {
    async fn get_search(&self, id: Uuid, user_id: Uuid) -> Result<Option<PersistedSearch>>;
    async fn list_searches(&self, user_id: Uuid) -> Result<Vec<PersistedSearch>>;
    async fn create_search(
        &self,
        user_id: Uuid,
        query: &str,
        search_data: &SearchData,
    ) -> Result<PersistedSearch>;
    async fn update_campaign(
        &self,
        id: Uuid,
        user_id: Uuid,
        entries: &[CampaignEntry],
    ) -> Result<()>;
    async fn update_campaign_progress(
        &self,
        id: Uuid,
        user_id: Uuid,
        progress: Option<&CampaignProgress>,
    ) -> Result<()>;
}

pub struct PgSearchStore {
    pool: PgPool,
}

impl PgSearchStore {
    pub fn new(pool: PgPool) -> Self {
        PgSearchStore { pool }
    }
}

#[derive(FromRow)]
struct SearchRow {
    id: Uuid,
    user_id: Uuid,
    query: String,
    search_data: Json<SearchData>,
    campaign: Option<Json<Vec<CampaignEntry>>>,
    campaign_progress: Option<Json<CampaignProgress>>,
    created_at: DateTime<Utc>,
}

impl From<SearchRow> for PersistedSearch {
    fn from(row: SearchRow) -> Self {
        PersistedSearch {
            id: row.id,
            user_id: row.user_id,
            query: row.query,
            search_data: row.search_data.0,
            campaign: row.campaign.map(|c| c.0),
            campaign_progress: row.campaign_progress.map(|p| p.0),
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SearchStore for PgSearchStore {
    async fn get_search(&self, id: Uuid, user_id: Uuid) -> Result<Option<PersistedSearch>> {
        let row = sqlx::query_as::<_, SearchRow>(
            r#"
            select id, user_id, query, search_data, campaign, campaign_progress, created_at
            from searches
            where id = $1 and user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch search")?;

        Ok(row.map(PersistedSearch::from))
    }

    async fn list_searches(&self, user_id: Uuid) -> Result<Vec<PersistedSearch>> {
        let rows = sqlx::query_as::<_, SearchRow>(
            r#"
            select id, user_id, query, search_data, campaign, campaign_progress, created_at
            from searches
            where user_id = $1
            order by created_at desc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list searches")?;

        Ok(rows.into_iter().map(PersistedSearch::from).collect())
    }

    async fn create_search(
        &self,
        user_id: Uuid,
        query: &str,
        search_data: &SearchData,
    ) -> Result<PersistedSearch> {
        let row = sqlx::query_as::<_, SearchRow>(
            r#"
            insert into searches (id, user_id, query, search_data)
            values ($1, $2, $3, $4)
            returning id, user_id, query, search_data, campaign, campaign_progress, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(query)
        .bind(Json(search_data))
        .fetch_one(&self.pool)
        .await
        .context("Failed to save search")?;

        Ok(row.into())
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        user_id: Uuid,
        entries: &[CampaignEntry],
    ) -> Result<()> {
        sqlx::query(
            r#"
            update searches
            set campaign = $3
            where id = $1 and user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(Json(entries))
        .execute(&self.pool)
        .await
        .context("Failed to update campaign")?;

        Ok(())
    }

    async fn update_campaign_progress(
        &self,
        id: Uuid,
        user_id: Uuid,
        progress: Option<&CampaignProgress>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            update searches
            set campaign_progress = $3
            where id = $1 and user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(progress.map(Json))
        .execute(&self.pool)
        .await
        .context("Failed to update campaign progress")?;

        Ok(())
    }
}
