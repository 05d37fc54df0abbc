use anyhow::Result;
use itertools::Itertools;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::dal::SearchStore;
use crate::domain::analysis::SearchPlan;
use crate::domain::category::{
    Category, Gathering, InfoExchange, License, Person, Platform, SearchData,
};
use crate::domain::search::PersistedSearch;

use super::category_search::{
    rank_and_dedup, search_category, CategoryRecord, SearchConfig, SearchType,
    DEFAULT_NUM_QUERIES, DEFAULT_NUM_RESULTS,
};
use super::exa_client::WebSearcher;
use super::openai_client::Extractor;

/// Per-category completion counter, emitted after every finished iteration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub category: Category,
    pub completed: usize,
    pub total: usize,
}

/// One frame of the streaming gatherings search.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatheringStreamEvent {
    pub status: StreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_industry: Option<String>,
    /// Percentage, 0 to 100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gatherings: Option<Vec<Gathering>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Searching,
    Completed,
}

fn emit(
    sender: Option<&UnboundedSender<ProgressEvent>>,
    category: Category,
    completed: usize,
    total: usize,
) {
    if let Some(sender) = sender {
        // A dropped receiver only means nobody is watching anymore.
        let _ = sender.send(ProgressEvent {
            category,
            completed,
            total,
        });
    }
}

fn iteration(plan: &SearchPlan, location: Option<&str>, profession: Option<&str>) -> SearchConfig {
    SearchConfig {
        query: plan.base_query.clone(),
        location: location.map(str::to_string),
        profession: profession.map(str::to_string),
        search_type: plan.search_type,
        num_queries: DEFAULT_NUM_QUERIES,
        num_results: DEFAULT_NUM_RESULTS,
    }
}

fn cross(plan: &SearchPlan, regions: &[String], audiences: &[String]) -> Vec<SearchConfig> {
    if audiences.is_empty() {
        return regions
            .iter()
            .map(|region| iteration(plan, Some(region.as_str()), None))
            .collect();
    }
    regions
        .iter()
        .cartesian_product(audiences.iter())
        .map(|(region, audience)| {
            iteration(plan, Some(region.as_str()), Some(audience.as_str()))
        })
        .collect()
}

/// Runs one category module over all of its iterations, sequentially.
/// A failed iteration is logged and skipped; the survivors are merged,
/// deduped, and sorted by relevance without truncation.
async fn collect<T: CategoryRecord>(
    extractor: &dyn Extractor,
    searcher: &dyn WebSearcher,
    configs: Vec<SearchConfig>,
    sender: Option<&UnboundedSender<ProgressEvent>>,
) -> Vec<T> {
    let total = configs.len();
    let mut items: Vec<T> = vec![];
    for (done, config) in configs.into_iter().enumerate() {
        match search_category::<T>(extractor, searcher, &config).await {
            Ok(found) => items.extend(found),
            Err(e) => log::error!(
                "{} iteration failed (region {:?}, audience {:?}): {:?}",
                T::CATEGORY,
                config.location,
                config.profession,
                e
            ),
        }
        emit(sender, T::CATEGORY, done + 1, total);
    }
    rank_and_dedup(items, usize::MAX)
}

/// Fans the finalized plan out across the selected category modules and
/// persists the aggregate as a new search row.
pub async fn run_plan(
    extractor: &dyn Extractor,
    searcher: &dyn WebSearcher,
    store: &dyn SearchStore,
    user_id: Uuid,
    plan: &SearchPlan,
    progress: Option<&UnboundedSender<ProgressEvent>>,
) -> Result<PersistedSearch> {
    let regions = plan.regions.all_regions();
    let audiences = plan.professions.all();
    let first_audience = plan.professions.first_available();

    let mut data = SearchData::default();
    for category in plan.selected_categories.iter().unique() {
        match category {
            Category::Gatherings => {
                let configs = cross(plan, &regions, &plan.professions.industries);
                data.gatherings =
                    Some(collect::<Gathering>(extractor, searcher, configs, progress).await);
            }
            Category::People => {
                let configs = cross(plan, &regions, &audiences);
                data.people = Some(collect::<Person>(extractor, searcher, configs, progress).await);
            }
            Category::Platforms => {
                // Platforms are rarely region-bound: one pass over the base
                // region is enough.
                let configs = vec![iteration(
                    plan,
                    Some(plan.regions.base_region.as_str()),
                    first_audience.as_deref(),
                )];
                data.platforms =
                    Some(collect::<Platform>(extractor, searcher, configs, progress).await);
            }
            Category::Exchanges => {
                let configs = regions
                    .iter()
                    .map(|region| {
                        iteration(plan, Some(region.as_str()), first_audience.as_deref())
                    })
                    .collect();
                data.exchanges =
                    Some(collect::<InfoExchange>(extractor, searcher, configs, progress).await);
            }
            Category::Licenses => {
                let configs = cross(plan, &regions, &audiences);
                data.licenses =
                    Some(collect::<License>(extractor, searcher, configs, progress).await);
            }
        }
        log::info!("Finished {} module for query \"{}\"", category, plan.base_query);
    }

    store.create_search(user_id, &plan.base_query, &data).await
}

/// Streaming variant of the gatherings module: emits a frame before each
/// region/industry iteration and a terminal frame carrying the aggregate.
pub async fn stream_gatherings(
    extractor: &dyn Extractor,
    searcher: &dyn WebSearcher,
    query: &str,
    regions: &[String],
    industries: &[String],
    sender: &UnboundedSender<GatheringStreamEvent>,
) -> Result<Vec<Gathering>> {
    let pairs: Vec<(&String, &String)> = regions
        .iter()
        .cartesian_product(industries.iter())
        .collect();
    let total = pairs.len().max(1);

    let mut items: Vec<Gathering> = vec![];
    for (done, (region, industry)) in pairs.into_iter().enumerate() {
        let _ = sender.send(GatheringStreamEvent {
            status: StreamStatus::Searching,
            current_region: Some(region.clone()),
            current_industry: Some(industry.clone()),
            progress: (done * 100 / total) as u8,
            gatherings: None,
        });

        let config = SearchConfig {
            query: query.to_string(),
            location: Some(region.clone()),
            profession: Some(industry.clone()),
            search_type: SearchType::Marketing,
            num_queries: DEFAULT_NUM_QUERIES,
            num_results: DEFAULT_NUM_RESULTS,
        };
        match search_category::<Gathering>(extractor, searcher, &config).await {
            Ok(found) => items.extend(found),
            Err(e) => log::error!(
                "gatherings iteration failed (region {region}, industry {industry}): {e:?}"
            ),
        }
    }

    let gatherings = rank_and_dedup(items, usize::MAX);
    let _ = sender.send(GatheringStreamEvent {
        status: StreamStatus::Completed,
        current_region: None,
        current_industry: None,
        progress: 100,
        gatherings: Some(gatherings.clone()),
    });
    Ok(gatherings)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::domain::analysis::{ProfessionSet, RegionSet};
    use crate::services::testing::{InMemorySearchStore, StubExtractor, StubSearcher};

    fn plan(categories: Vec<Category>) -> SearchPlan {
        SearchPlan {
            base_query: "marketing help for my bakery".to_string(),
            regions: RegionSet {
                base_region: "Chicago".to_string(),
                larger: vec!["Midwest".to_string()],
                smaller: vec![],
            },
            professions: ProfessionSet {
                professions: vec!["baker".to_string()],
                industries: vec!["bakeries".to_string()],
            },
            selected_categories: categories,
            search_type: SearchType::Marketing,
        }
    }

    fn full_extractor() -> StubExtractor {
        StubExtractor::new(vec![
            (
                "Generate 5 search queries",
                json!({ "queries": ["bakers near Chicago"], "reasoning": "" }),
            ),
            (
                "about a person",
                json!({
                    "name": "Alice",
                    "title": "Head Baker",
                    "location": "Chicago",
                    "description": "Runs a neighborhood bakery.",
                    "relevanceScore": 0.9
                }),
            ),
            (
                "about a professional gathering",
                json!({
                    "name": "Bakery Expo",
                    "description": "Annual trade show.",
                    "location": "Chicago",
                    "type": "expo",
                    "relevanceScore": 0.8
                }),
            ),
            (
                "about a platform",
                json!({
                    "name": "BakeMarket",
                    "description": "Marketplace for bakeries.",
                    "relevanceScore": 0.7
                }),
            ),
            (
                "about an information exchange",
                json!({
                    "name": "Bakers Weekly",
                    "description": "Trade newsletter.",
                    "relevanceScore": 0.75
                }),
            ),
            (
                "about a professional license",
                json!({
                    "name": "Food Handler Permit",
                    "description": "Required to sell baked goods.",
                    "relevanceScore": 0.85
                }),
            ),
        ])
    }

    fn searcher() -> StubSearcher {
        StubSearcher::new(vec![StubSearcher::hit(
            "Result",
            "https://example.com/r",
            "Some content.",
        )])
    }

    #[tokio::test]
    async fn run_plan_fills_every_selected_category_and_persists() {
        let extractor = full_extractor();
        let searcher = searcher();
        let store = InMemorySearchStore::new();
        let user_id = Uuid::new_v4();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let plan = plan(vec![
            Category::Gatherings,
            Category::People,
            Category::Platforms,
            Category::Exchanges,
            Category::Licenses,
        ]);
        let search = run_plan(&extractor, &searcher, &store, user_id, &plan, Some(&tx))
            .await
            .expect("fan-out should succeed");
        drop(tx);

        let data = &search.search_data;
        assert_eq!(data.gatherings.as_ref().map(Vec::len), Some(1));
        assert_eq!(data.people.as_ref().map(Vec::len), Some(1));
        assert_eq!(data.platforms.as_ref().map(Vec::len), Some(1));
        assert_eq!(data.exchanges.as_ref().map(Vec::len), Some(1));
        assert_eq!(data.licenses.as_ref().map(Vec::len), Some(1));

        let persisted = store.row(search.id).expect("row persisted");
        assert_eq!(persisted.user_id, user_id);
        assert_eq!(persisted.query, "marketing help for my bakery");

        // 2 regions x (1 profession + 1 industry) for people and licenses,
        // 2 regions x 1 industry for gatherings, 2 regions for exchanges,
        // a single pass for platforms.
        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let people_events: Vec<_> = events
            .iter()
            .filter(|e| e.category == Category::People)
            .collect();
        assert_eq!(people_events.len(), 4);
        assert_eq!(people_events.last().map(|e| (e.completed, e.total)), Some((4, 4)));
        assert!(events
            .iter()
            .any(|e| e.category == Category::Platforms && e.total == 1));
    }

    #[tokio::test]
    async fn failed_category_iterations_do_not_abort_the_run() {
        // No stub for platform query generation: every platforms iteration
        // fails, while the people module still completes.
        let extractor = StubExtractor::new(vec![
            (
                "queries to find a person",
                json!({ "queries": ["bakers near Chicago"], "reasoning": "" }),
            ),
            (
                "about a person",
                json!({
                    "name": "Alice",
                    "title": "Head Baker",
                    "location": "Chicago",
                    "description": "Runs a neighborhood bakery.",
                    "relevanceScore": 0.9
                }),
            ),
        ]);
        let searcher = searcher();
        let store = InMemorySearchStore::new();

        let plan = plan(vec![Category::People, Category::Platforms]);
        let search = run_plan(&extractor, &searcher, &store, Uuid::new_v4(), &plan, None)
            .await
            .expect("fan-out should tolerate iteration failures");

        assert_eq!(search.search_data.people.as_ref().map(Vec::len), Some(1));
        assert_eq!(search.search_data.platforms.as_ref().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn help_plans_flavor_the_category_prompts() {
        // The stub only answers query generation aimed at helpers, so a plan
        // that pinned the marketing flavor would produce nothing.
        let extractor = StubExtractor::new(vec![
            (
                "matches for people who can help",
                json!({ "queries": ["bakery consultants in Chicago"], "reasoning": "" }),
            ),
            (
                "about a person",
                json!({
                    "name": "Alice",
                    "title": "Bakery Consultant",
                    "location": "Chicago",
                    "description": "Advises small bakeries.",
                    "relevanceScore": 0.9
                }),
            ),
        ]);
        let searcher = searcher();
        let store = InMemorySearchStore::new();

        let mut plan = plan(vec![Category::People]);
        plan.search_type = SearchType::Help;
        let search = run_plan(&extractor, &searcher, &store, Uuid::new_v4(), &plan, None)
            .await
            .expect("fan-out should succeed");

        assert_eq!(search.search_data.people.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn stream_gatherings_reports_progress_then_terminal_frame() {
        let extractor = full_extractor();
        let searcher = searcher();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let regions = vec!["Chicago".to_string(), "Midwest".to_string()];
        let industries = vec!["bakeries".to_string()];
        let gatherings = stream_gatherings(
            &extractor,
            &searcher,
            "marketing help for my bakery",
            &regions,
            &industries,
            &tx,
        )
        .await
        .expect("stream should succeed");
        drop(tx);

        assert_eq!(gatherings.len(), 1);

        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].status, StreamStatus::Searching);
        assert_eq!(events[0].current_region.as_deref(), Some("Chicago"));
        assert_eq!(events[0].progress, 0);
        assert_eq!(events[1].progress, 50);
        let last = events.last().expect("terminal frame");
        assert_eq!(last.status, StreamStatus::Completed);
        assert_eq!(last.progress, 100);
        assert_eq!(last.gatherings.as_ref().map(Vec::len), Some(1));
    }
}
