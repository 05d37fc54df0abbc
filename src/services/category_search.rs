use std::cmp::Ordering;

use anyhow::Result;
use futures::future::join_all;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::category::{Category, Gathering, InfoExchange, License, Person, Platform};
pub use crate::domain::category::SearchType;

use super::exa_client::{SearchHit, WebSearcher};
use super::openai_client::{extract, Extractor};

pub const DEFAULT_NUM_QUERIES: usize = 5;
pub const DEFAULT_NUM_RESULTS: usize = 5;
const RESULTS_PER_QUERY: usize = 5;
// Hard token-budget guard before the per-result extraction call.
const CONTENT_CHAR_LIMIT: usize = 1000;
const MIN_RELEVANCE: f64 = 0.5;

/// One category-module invocation: the user's base query narrowed to a
/// single region and profession/industry.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub query: String,
    pub location: Option<String>,
    pub profession: Option<String>,
    pub search_type: SearchType,
    pub num_queries: usize,
    pub num_results: usize,
}

/// Category descriptor: everything that differs between the five category
/// modules — the projection prompt, the dedup key, and where the source URL
/// lands.
pub trait CategoryRecord: DeserializeOwned + Serialize + Clone + Send + Sync {
    const CATEGORY: Category;

    /// What the extraction prompt says it is looking for.
    fn subject() -> &'static str;
    /// Field list for the projection prompt, one bullet per schema field.
    fn extraction_fields() -> &'static str;

    fn relevance_score(&self) -> f64;
    fn dedup_key(&self) -> String;
    fn set_source(&mut self, url: &str);
}

impl CategoryRecord for Person {
    const CATEGORY: Category = Category::People;

    fn subject() -> &'static str {
        "a person"
    }

    fn extraction_fields() -> &'static str {
        r#"- name: person's name
- title: their current role/title
- company: their company (if mentioned)
- location: their location
- description: brief description of their background"#
    }

    fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    fn dedup_key(&self) -> String {
        self.name.clone()
    }

    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
    }
}

impl CategoryRecord for Gathering {
    const CATEGORY: Category = Category::Gatherings;

    fn subject() -> &'static str {
        "a professional gathering (conference, expo, fair, or meetup)"
    }

    fn extraction_fields() -> &'static str {
        r#"- name: name of the gathering
- description: brief description of the gathering
- date: date or date range if available
- location: specific location of the gathering
- url: official website URL if mentioned
- type: type of gathering, one of "conference", "expo", "fair", "meetup", "other"
- contact_information: contact information for the gathering if available"#
    }

    fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    // Gatherings are distinct per venue: the same event name may run in
    // several locations.
    fn dedup_key(&self) -> String {
        format!("{}-{}", self.name, self.location)
    }

    fn set_source(&mut self, url: &str) {
        if self.url.is_none() {
            self.url = Some(url.to_string());
        }
    }
}

impl CategoryRecord for Platform {
    const CATEGORY: Category = Category::Platforms;

    fn subject() -> &'static str {
        "a platform, marketplace, or online service"
    }

    fn extraction_fields() -> &'static str {
        r#"- name: name of the platform
- type: kind of platform
- description: brief description of what the platform offers
- location: region the platform serves (if regional)
- features: array of notable features
- pricing: pricing information if mentioned
- userBase: description of the platform's user base if mentioned"#
    }

    fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    fn dedup_key(&self) -> String {
        self.name.clone()
    }

    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
    }
}

impl CategoryRecord for InfoExchange {
    const CATEGORY: Category = Category::Exchanges;

    fn subject() -> &'static str {
        "an information exchange (newsletter, forum, trade publication, or community)"
    }

    fn extraction_fields() -> &'static str {
        r#"- name: name of the information exchange
- type: kind of exchange (newsletter, forum, publication, community)
- description: brief description of the exchange
- location: region it covers (if regional)
- audience: who reads or participates
- frequency: publication or meeting frequency if mentioned
- contact: contact information if available"#
    }

    fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    fn dedup_key(&self) -> String {
        self.name.clone()
    }

    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
    }
}

impl CategoryRecord for License {
    const CATEGORY: Category = Category::Licenses;

    fn subject() -> &'static str {
        "a professional license, registration, or certification"
    }

    fn extraction_fields() -> &'static str {
        r#"- name: name of the license or registration
- type: kind of license
- description: brief description of what it covers
- databaseUrl: URL of the public license database if mentioned
- jurisdiction: issuing jurisdiction
- requirements: array of requirements to obtain it"#
    }

    fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    fn dedup_key(&self) -> String {
        self.name.clone()
    }

    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
    }
}

#[derive(Deserialize)]
struct QueryExpansion {
    queries: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: String,
}

pub fn truncate_content(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn criteria_lines(config: &SearchConfig) -> String {
    format!(
        "Location: {}\nProfession: {}\nSearch Type: {}",
        config.location.as_deref().unwrap_or("any"),
        config.profession.as_deref().unwrap_or("any"),
        config.search_type.label(),
    )
}

/// Expand the user's need into K focused query variants for this category.
pub async fn generate_search_queries<T: CategoryRecord>(
    extractor: &dyn Extractor,
    config: &SearchConfig,
    num_queries: usize,
) -> Result<Vec<String>> {
    let prompt = format!(
        r#"Generate {num_queries} search queries to find {subject} matches for {audience}.

User's specific need: "{query}"
{criteria}

Return a JSON object with:
- queries: array of {num_queries} search queries optimized for finding relevant results
- reasoning: brief explanation of the search strategy

Make sure to:
- Keep each query concise and focused
- Include the location and profession in each query where natural
- Use different phrasings and keywords
- Include both broader and more specific variations
- Use natural language that a user would type
- Avoid duplicate or very similar queries
- Include industry-specific terminology when relevant"#,
        subject = T::subject(),
        audience = config.search_type.audience(),
        query = config.query,
        criteria = criteria_lines(config),
    );

    let expansion: QueryExpansion = extract(extractor, &prompt, None).await?;
    Ok(expansion.queries)
}

async fn analyze_hit<T: CategoryRecord>(
    extractor: &dyn Extractor,
    hit: &SearchHit,
    config: &SearchConfig,
) -> Result<T> {
    let prompt = format!(
        r#"Extract and analyze information about {subject} from this search result:

Title: {title}
Content: {content}
URL: {url}

Original Query: "{query}"
{criteria}

Return a JSON object with:
{fields}
- relevanceScore: how relevant this result is to the query and criteria (a number between 0 and 1)

Consider how well the result matches the location, the profession or industry, and the purpose of the search."#,
        subject = T::subject(),
        title = hit.title,
        content = hit.text,
        url = hit.url,
        query = config.query,
        criteria = criteria_lines(config),
        fields = T::extraction_fields(),
    );

    let mut item: T = extract(extractor, &prompt, None).await?;
    item.set_source(&hit.url);
    Ok(item)
}

/// Drop low-relevance items, keep the highest-scoring item per dedup key,
/// and return the survivors sorted by descending relevance, at most `limit`.
pub fn rank_and_dedup<T: CategoryRecord>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    items.retain(|item| item.relevance_score() >= MIN_RELEVANCE);
    items.sort_by(|a, b| {
        b.relevance_score()
            .partial_cmp(&a.relevance_score())
            .unwrap_or(Ordering::Equal)
    });
    items
        .into_iter()
        .unique_by(|item| item.dedup_key())
        .take(limit)
        .collect()
}

/// One category-module invocation: expand the query, search each variant,
/// project every hit into the category schema, then filter, dedup, and rank.
/// A failed search or extraction skips that unit only.
pub async fn search_category<T: CategoryRecord>(
    extractor: &dyn Extractor,
    searcher: &dyn WebSearcher,
    config: &SearchConfig,
) -> Result<Vec<T>> {
    let queries = generate_search_queries::<T>(extractor, config, config.num_queries).await?;

    let searches = join_all(
        queries
            .iter()
            .map(|query| searcher.search(query, RESULTS_PER_QUERY)),
    )
    .await;

    let mut hits: Vec<SearchHit> = vec![];
    for (query, result) in queries.iter().zip(searches) {
        match result {
            Ok(found) => hits.extend(found),
            Err(e) => log::error!(
                "{} search failed for query \"{}\": {:?}",
                T::CATEGORY,
                query,
                e
            ),
        }
    }
    for hit in &mut hits {
        hit.text = truncate_content(&hit.text, CONTENT_CHAR_LIMIT);
    }

    let extractions = join_all(hits.iter().map(|hit| analyze_hit::<T>(extractor, hit, config))).await;

    let mut items: Vec<T> = vec![];
    for (hit, result) in hits.iter().zip(extractions) {
        match result {
            Ok(item) => items.push(item),
            Err(e) => log::error!(
                "{} extraction failed for result {}: {:?}",
                T::CATEGORY,
                hit.url,
                e
            ),
        }
    }

    Ok(rank_and_dedup(items, config.num_results))
}
