use serde::{Deserialize, Serialize};

use super::category::{Category, SearchType};

/// First-pass analysis of the user's free-text query. Product extraction is
/// mandatory; location and profession may be filled in later from the
/// user's profile text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub has_location: bool,
    pub has_profession: bool,
    pub has_product: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    pub reasoning: String,
}

/// Second-pass analysis over the user profile, used only to fill fields the
/// query analysis left empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAnalysis {
    pub has_location: bool,
    pub has_profession: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionAnalysis {
    pub larger_regions: Vec<String>,
    pub smaller_regions: Vec<String>,
    pub reasoning: String,
}

impl RegionAnalysis {
    pub fn empty() -> Self {
        RegionAnalysis {
            larger_regions: vec![],
            smaller_regions: vec![],
            reasoning: String::new(),
        }
    }
}

/// The finalized region selection. The base region never appears in
/// `larger`/`smaller`, and no entry is an entire country.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSet {
    pub base_region: String,
    pub larger: Vec<String>,
    pub smaller: Vec<String>,
}

impl RegionSet {
    /// Base region first, then larger, then smaller regions.
    pub fn all_regions(&self) -> Vec<String> {
        let mut regions = vec![self.base_region.clone()];
        regions.extend(self.larger.iter().cloned());
        regions.extend(self.smaller.iter().cloned());
        regions
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessionIndustryAnalysis {
    pub professions: Vec<String>,
    pub industries: Vec<String>,
    pub reasoning: String,
}

impl ProfessionIndustryAnalysis {
    pub fn empty() -> Self {
        ProfessionIndustryAnalysis {
            professions: vec![],
            industries: vec![],
            reasoning: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionSet {
    pub professions: Vec<String>,
    pub industries: Vec<String>,
}

impl ProfessionSet {
    /// Professions first, then industries. The combined list drives the
    /// people/license cross-product during fan-out.
    pub fn all(&self) -> Vec<String> {
        let mut all = self.professions.clone();
        all.extend(self.industries.iter().cloned());
        all
    }

    /// Tie-break used by the single-shot categories: first profession,
    /// falling back to the first industry.
    pub fn first_available(&self) -> Option<String> {
        self.professions
            .first()
            .or_else(|| self.industries.first())
            .cloned()
    }
}

/// The frozen plan handed to the fan-out orchestrator once the user
/// finalizes their region and audience selections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPlan {
    pub base_query: String,
    pub regions: RegionSet,
    pub professions: ProfessionSet,
    pub selected_categories: Vec<Category>,
    #[serde(default)]
    pub search_type: SearchType,
}

/// Synthesized reply for the plan-confirmation step.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<RegionSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professions: Option<ProfessionSet>,
}
