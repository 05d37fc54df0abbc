use serde::{Deserialize, Serialize};

use super::category::Person;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contacts: Vec<Contact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub name: String,
    pub summary: String,
}

/// One entry per person in the search's people list, in list order. The
/// summary and contact fields stay absent when navigation or extraction
/// failed for that person.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignEntry {
    pub original_person: Person,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PageSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
}

impl CampaignEntry {
    pub fn bare(person: Person) -> Self {
        CampaignEntry {
            original_person: person,
            summary: None,
            contact_info: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Navigating,
    ExtractingSummary,
    ExtractingContacts,
    Completed,
    Failed,
}

/// Ephemeral progress record, overwritten in place while a campaign runs
/// and cleared to null once the run finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignProgress {
    pub current_person: usize,
    pub total_people: usize,
    pub current_person_name: String,
    pub status: CampaignStatus,
}
