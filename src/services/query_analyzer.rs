use anyhow::Result;

use crate::domain::analysis::{
    AgentResponse, ProfessionIndustryAnalysis, ProfessionSet, ProfileAnalysis, QueryAnalysis,
    RegionAnalysis, RegionSet,
};

use super::openai_client::{extract, Extractor};

// Region entries must stay below country granularity.
const COUNTRY_NAMES: &[&str] = &[
    "United States",
    "United States of America",
    "USA",
    "US",
    "Canada",
    "Mexico",
    "United Kingdom",
    "UK",
    "France",
    "Germany",
    "Spain",
    "Italy",
    "India",
    "China",
    "Japan",
    "Australia",
    "Brazil",
];

/// Two-pass query analysis: extract location/profession/product from the
/// query itself, then fall back to the user profile for whatever is still
/// missing. Fields found in the first pass are never overwritten.
pub async fn analyze_query(
    extractor: &dyn Extractor,
    query: &str,
    user_profile: &str,
) -> Result<QueryAnalysis> {
    let prompt = format!(
        r#"Analyze this query and determine if it contains location/region, profession/industry, and extract product/service information. THE PRODUCT/SERVICE INFORMATION IS MANDATORY AND WILL BE PRESENT IN THE QUERY:
"{query}"

Return a JSON object with:
- hasLocation: boolean indicating if a location is mentioned
- hasProfession: boolean indicating if a profession/industry that the target audience might be in is mentioned
- hasProduct: boolean indicating if a product/service is mentioned
- location: the extracted location if present
- profession: the extracted profession/industry if present, make sure it is one word, or some hyphenated words. If no profession is found, leave it empty and put "Unknown" in the reasoning.
- product: a product/service that the user mentions
- reasoning: brief explanation of your analysis"#
    );

    let mut analysis: QueryAnalysis = extract(extractor, &prompt, None).await?;
    log::info!("Query analysis: {:?}", analysis);

    if !analysis.has_location || !analysis.has_profession {
        let profile_prompt = format!(
            r#"Extract location and profession information from this user profile:
"{user_profile}"

Return a JSON object with:
- hasLocation: boolean indicating if a location is mentioned
- hasProfession: boolean indicating if a profession/industry is mentioned
- location: the extracted location if present
- profession: the extracted profession/industry if present
- reasoning: brief explanation of your analysis

IF THE USER PROFILE IS EMPTY INFER THE PROFESSION OF THE USER FROM THE QUERY
Query: "{query}"

DO NOT LEAVE PROFESSION AS UNKNOWN"#
        );

        let profile_analysis: ProfileAnalysis = extract(extractor, &profile_prompt, None).await?;

        if !analysis.has_location && profile_analysis.has_location {
            if let Some(location) = profile_analysis.location {
                analysis.has_location = true;
                analysis.location = Some(location);
            }
        }
        if !analysis.has_profession && profile_analysis.has_profession {
            if let Some(profession) = profile_analysis.profession {
                analysis.has_profession = true;
                analysis.profession = Some(profession);
            }
        }
        analysis.reasoning.push_str(" Trying profile data, here is what I found: ");
        analysis.reasoning.push_str(&profile_analysis.reasoning);
    }

    Ok(analysis)
}

/// Expand a base region into containing and contained regions. Whole-country
/// entries and the base region itself are stripped in code rather than
/// trusted to the prompt.
pub async fn analyze_regions(extractor: &dyn Extractor, location: &str) -> Result<RegionAnalysis> {
    let prompt = format!(
        r#"Given a region "{location}", analyze and return:
1. Larger regions that contain this region (e.g., if given "San Francisco", return ["Bay Area", "California", "Western US"])
2. Smaller regions within this region (e.g., if given "Midwest", return ["Illinois", "Indiana", "Michigan", "Ohio", "Wisconsin"]). This can include major cities in these regions too.

Return a JSON object with:
- largerRegions: array of larger regions that contain the given region
- smallerRegions: array of smaller regions within the given region
- reasoning: brief explanation of your analysis

Make sure to:
- Include both administrative divisions (states, counties) and common regional groupings
- Consider both geographic and cultural/economic regions
- Return empty arrays if no relevant regions are found
- Keep region names consistent and clear
- Not choose entire country as a region
- Ensure that the list is comprehensive and includes a good mix of regions, including some cities, counties, states, etc."#
    );

    let analysis: RegionAnalysis = extract(
        extractor,
        &prompt,
        Some("You are a helpful assistant that analyzes regions and is an expert in geography."),
    )
    .await?;

    Ok(clean_regions(location, analysis))
}

fn is_entire_country(region: &str) -> bool {
    COUNTRY_NAMES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(region.trim()))
}

fn clean_regions(base_region: &str, mut analysis: RegionAnalysis) -> RegionAnalysis {
    let keep = |region: &String| {
        !is_entire_country(region) && !region.trim().eq_ignore_ascii_case(base_region.trim())
    };
    analysis.larger_regions.retain(keep);
    analysis.smaller_regions.retain(keep);
    analysis
}

/// Identify target professions and industries from either the base query or
/// the extracted product.
pub async fn analyze_professions_and_industries(
    extractor: &dyn Extractor,
    input: &str,
    is_product: bool,
) -> Result<ProfessionIndustryAnalysis> {
    let subject = if is_product { "product/service" } else { "query" };
    let prompt = format!(
        r#"Given a {subject}: "{input}", analyze and return:
1. Professions that would be relevant to this {subject} (e.g., for "project management software", return ["Project Manager", "Team Lead", "Product Manager", "Scrum Master"])
2. Industries that would be relevant to this {subject} (e.g., for "project management software", return ["Software Development", "Construction", "Healthcare", "Education"])

Return a JSON object with:
- professions: array of relevant professions
- industries: array of relevant industries
- reasoning: brief explanation of your analysis

Make sure to:
- Include both direct users and decision-makers
- Consider both primary and secondary use cases
- Return empty arrays if no relevant professions/industries are found
- Keep names consistent and clear
- Focus on specific roles and industries rather than broad categories
- Consider both traditional and emerging professions/industries
- If the {subject} mentions specific professions or industries, prioritize those"#
    );

    let system = if is_product {
        "You are a helpful assistant that analyzes products and identifies relevant professions and industries."
    } else {
        "You are a helpful assistant that analyzes queries and identifies relevant professions and industries."
    };

    extract(extractor, &prompt, Some(system)).await
}

fn normalize_key(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn union_insensitive(a: Vec<String>, b: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for item in a.into_iter().chain(b) {
        if seen.insert(normalize_key(&item)) {
            merged.push(item);
        }
    }
    merged
}

/// Union of the query-derived and product-derived audience analyses. Matching
/// is case- and whitespace-insensitive; the first spelling encountered wins.
pub fn merge_profession_industry_analyses(
    a: ProfessionIndustryAnalysis,
    b: ProfessionIndustryAnalysis,
) -> ProfessionIndustryAnalysis {
    ProfessionIndustryAnalysis {
        professions: union_insensitive(a.professions, b.professions),
        industries: union_insensitive(a.industries, b.industries),
        reasoning: format!("Combined analysis: {} {}", a.reasoning, b.reasoning),
    }
}

/// Pure synthesis of the plan-confirmation reply from the three analyses.
pub fn generate_response(
    query_analysis: &QueryAnalysis,
    region_analysis: &RegionAnalysis,
    profession_analysis: &ProfessionIndustryAnalysis,
) -> AgentResponse {
    let mut response = AgentResponse {
        text: String::new(),
        regions: None,
        professions: None,
    };

    let has_audience = !profession_analysis.professions.is_empty()
        || !profession_analysis.industries.is_empty();

    match (&query_analysis.location, &query_analysis.profession) {
        (Some(location), Some(profession))
            if query_analysis.has_location && query_analysis.has_profession =>
        {
            response.text = format!(
                "I understand you're looking for {} in {}.",
                profession, location
            );

            if !region_analysis.larger_regions.is_empty()
                || !region_analysis.smaller_regions.is_empty()
            {
                response.text.push_str(" Determining Relevant Regions...");
                response.regions = Some(RegionSet {
                    base_region: location.clone(),
                    larger: region_analysis.larger_regions.clone(),
                    smaller: region_analysis.smaller_regions.clone(),
                });
            }
            if has_audience {
                response
                    .text
                    .push_str(" Here are some potential target audiences:");
                response.professions = Some(ProfessionSet {
                    professions: profession_analysis.professions.clone(),
                    industries: profession_analysis.industries.clone(),
                });
            }
        }
        _ => match &query_analysis.product {
            Some(product) if query_analysis.has_product => {
                response.text = format!("I'll help you with information about {}.", product);
                if has_audience {
                    response
                        .text
                        .push_str(" Here are some potential target audiences:");
                    response.professions = Some(ProfessionSet {
                        professions: profession_analysis.professions.clone(),
                        industries: profession_analysis.industries.clone(),
                    });
                }
            }
            _ => {
                response.text =
                    "I'll help you with your general query. This is a placeholder response."
                        .to_string();
            }
        },
    }

    response
}

/// Full plan-analysis pipeline: query analysis, then region expansion when a
/// location is present, then audience analysis from the query merged with the
/// product's when one was extracted.
pub async fn run_agent(
    extractor: &dyn Extractor,
    query: &str,
    user_profile: &str,
) -> Result<AgentResponse> {
    let query_analysis = analyze_query(extractor, query, user_profile).await?;

    let region_analysis = match &query_analysis.location {
        Some(location) if query_analysis.has_location => {
            analyze_regions(extractor, location).await?
        }
        _ => RegionAnalysis::empty(),
    };

    let query_audience = analyze_professions_and_industries(extractor, query, false).await?;
    let profession_analysis = match &query_analysis.product {
        Some(product) if query_analysis.has_product => {
            let product_audience =
                analyze_professions_and_industries(extractor, product, true).await?;
            merge_profession_industry_analyses(query_audience, product_audience)
        }
        _ => query_audience,
    };

    Ok(generate_response(
        &query_analysis,
        &region_analysis,
        &profession_analysis,
    ))
}
