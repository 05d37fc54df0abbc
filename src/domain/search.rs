use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::campaign::{CampaignEntry, CampaignProgress};
use super::category::SearchData;

/// A saved search row: the aggregate of one fan-out run, later enriched in
/// place by the campaign runner. Owned by the persistence gateway and always
/// scoped by `(id, user_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSearch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub query: String,
    pub search_data: SearchData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<Vec<CampaignEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_progress: Option<CampaignProgress>,
    pub created_at: DateTime<Utc>,
}
