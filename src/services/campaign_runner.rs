use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::dal::SearchStore;
use crate::domain::campaign::{
    CampaignEntry, CampaignProgress, CampaignStatus, ContactInfo, PageSummary,
};
use crate::domain::category::Person;
use crate::domain::search::PersistedSearch;

use super::droid::Browser;
use super::openai_client::{extract, Extractor};

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

fn progress(index: usize, total: usize, person: &Person, status: CampaignStatus) -> CampaignProgress {
    CampaignProgress {
        current_person: index + 1,
        total_people: total,
        current_person_name: person.name.clone(),
        status,
    }
}

fn summary_prompt(person: &Person, page_text: &str) -> String {
    format!(
        r#"Summarize this web page about {name} in 150 words or less.
Focus on who they are, what they do, and anything relevant to reaching out to them.

Page content:
{page_text}

Return a JSON object with:
- name: the person's name as it appears on the page
- summary: the summary, 150 words or less"#,
        name = person.name,
    )
}

fn contacts_prompt(person: &Person, page_text: &str) -> String {
    format!(
        r#"Extract all contact information from this web page about {name}.
Include every email address, phone number, and postal address on the page,
even ones that belong to an organization rather than the person.

Page content:
{page_text}

Return a JSON object with:
- contacts: array of objects, each with optional name, phone, email, address, and role fields"#,
        name = person.name,
    )
}

/// Visits one person's source page and extracts a summary and contacts,
/// flushing a progress row before each stage.
async fn process_person(
    store: &dyn SearchStore,
    browser: &dyn Browser,
    extractor: &dyn Extractor,
    search: &PersistedSearch,
    person: &Person,
    index: usize,
    total: usize,
) -> Result<CampaignEntry> {
    store
        .update_campaign_progress(
            search.id,
            search.user_id,
            Some(&progress(index, total, person, CampaignStatus::Navigating)),
        )
        .await?;

    let source = match person.source.as_deref() {
        Some(source) => source,
        None => {
            log::info!("No source URL for {}, skipping page visit", person.name);
            return Ok(CampaignEntry::bare(person.clone()));
        }
    };
    let url = Url::parse(source)
        .with_context(|| format!("Invalid source URL for {}: {source}", person.name))?;

    browser.navigate(url.as_str(), NAVIGATION_TIMEOUT).await?;
    let page_text = browser.page_text().await?;

    store
        .update_campaign_progress(
            search.id,
            search.user_id,
            Some(&progress(index, total, person, CampaignStatus::ExtractingSummary)),
        )
        .await?;
    let summary: PageSummary = extract(extractor, &summary_prompt(person, &page_text), None).await?;

    store
        .update_campaign_progress(
            search.id,
            search.user_id,
            Some(&progress(index, total, person, CampaignStatus::ExtractingContacts)),
        )
        .await?;
    let contact_info: ContactInfo =
        extract(extractor, &contacts_prompt(person, &page_text), None).await?;

    Ok(CampaignEntry {
        original_person: person.clone(),
        summary: Some(summary),
        contact_info: Some(contact_info),
    })
}

/// Walks the search's people list in order, one person at a time over a
/// single browser session. A failure for one person records a bare entry
/// and moves on; the accumulated list is persisted after every person so a
/// crash loses at most the person in flight. The progress row is cleared
/// once the run ends, whether it completed or was cancelled.
pub async fn run_campaign(
    store: &dyn SearchStore,
    browser: &dyn Browser,
    extractor: &dyn Extractor,
    search: &PersistedSearch,
    cancel: &AtomicBool,
) -> Result<Vec<CampaignEntry>> {
    let people: Vec<Person> = search
        .search_data
        .people
        .clone()
        .unwrap_or_default();
    let total = people.len();
    log::info!("Starting campaign over {} people for search {}", total, search.id);

    let mut entries: Vec<CampaignEntry> = Vec::with_capacity(total);
    for (index, person) in people.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            log::info!(
                "Campaign for search {} cancelled after {} of {} people",
                search.id,
                index,
                total
            );
            break;
        }

        match process_person(store, browser, extractor, search, person, index, total).await {
            Ok(entry) => {
                entries.push(entry);
                store
                    .update_campaign(search.id, search.user_id, &entries)
                    .await?;
                store
                    .update_campaign_progress(
                        search.id,
                        search.user_id,
                        Some(&progress(index, total, person, CampaignStatus::Completed)),
                    )
                    .await?;
            }
            // A failed person stays `failed` in the progress row; only
            // successful entries read as completed.
            Err(e) => {
                log::error!("Campaign step failed for {}: {:?}", person.name, e);
                entries.push(CampaignEntry::bare(person.clone()));
                store
                    .update_campaign(search.id, search.user_id, &entries)
                    .await?;
                store
                    .update_campaign_progress(
                        search.id,
                        search.user_id,
                        Some(&progress(index, total, person, CampaignStatus::Failed)),
                    )
                    .await?;
            }
        }
    }

    store
        .update_campaign_progress(search.id, search.user_id, None)
        .await?;
    log::info!(
        "Campaign for search {} finished with {} entries",
        search.id,
        entries.len()
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::domain::category::SearchData;
    use crate::services::testing::{InMemorySearchStore, StubBrowser, StubExtractor};

    fn person(name: &str, source: Option<&str>) -> Person {
        Person {
            name: name.to_string(),
            title: "Owner".to_string(),
            company: None,
            location: "Chicago".to_string(),
            relevance_score: 0.9,
            source: source.map(str::to_string),
            description: "A small business owner.".to_string(),
        }
    }

    fn seeded_search(store: &InMemorySearchStore, people: Vec<Person>) -> PersistedSearch {
        let search = PersistedSearch {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            query: "marketing help for my bakery".to_string(),
            search_data: SearchData {
                people: Some(people),
                ..SearchData::default()
            },
            campaign: None,
            campaign_progress: None,
            created_at: Utc::now(),
        };
        store.seed(search.clone());
        search
    }

    fn extractor() -> StubExtractor {
        StubExtractor::new(vec![
            (
                "Summarize this web page",
                json!({ "name": "Someone", "summary": "A short summary." }),
            ),
            (
                "Extract all contact information",
                json!({ "contacts": [{ "email": "someone@example.com" }] }),
            ),
        ])
    }

    #[tokio::test]
    async fn completes_every_person_in_order_and_clears_progress() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(
            &store,
            vec![
                person("Alice", Some("https://example.com/alice")),
                person("Bob", Some("https://example.com/bob")),
            ],
        );
        let browser = StubBrowser::new();
        let extractor = extractor();
        let cancel = AtomicBool::new(false);

        let entries = run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("campaign should succeed");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].original_person.name, "Alice");
        assert_eq!(entries[1].original_person.name, "Bob");
        assert!(entries.iter().all(|e| e.summary.is_some()));
        assert_eq!(
            entries[0]
                .contact_info
                .as_ref()
                .and_then(|c| c.contacts.first())
                .and_then(|c| c.email.as_deref()),
            Some("someone@example.com")
        );

        let row = store.row(search.id).expect("row exists");
        assert_eq!(row.campaign.as_ref().map(Vec::len), Some(2));
        assert!(row.campaign_progress.is_none());
    }

    #[tokio::test]
    async fn navigation_failure_records_bare_entry_and_continues() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(
            &store,
            vec![
                person("Alice", Some("https://example.com/alice")),
                person("Bob", Some("https://example.com/broken")),
                person("Carol", Some("https://example.com/carol")),
            ],
        );
        let browser = StubBrowser::failing_on("broken");
        let extractor = extractor();
        let cancel = AtomicBool::new(false);

        let entries = run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("campaign should tolerate a navigation failure");

        assert_eq!(entries.len(), 3);
        assert!(entries[0].summary.is_some());
        assert!(entries[1].summary.is_none());
        assert!(entries[1].contact_info.is_none());
        assert!(entries[2].summary.is_some());
    }

    #[tokio::test]
    async fn person_without_source_gets_bare_entry_without_navigation() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(&store, vec![person("Alice", None)]);
        let browser = StubBrowser::failing_on("example.com");
        let extractor = StubExtractor::new(vec![]);
        let cancel = AtomicBool::new(false);

        let entries = run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("campaign should skip the page visit");

        assert_eq!(entries.len(), 1);
        assert!(entries[0].summary.is_none());
        assert_eq!(extractor.calls(), 0);
    }

    #[tokio::test]
    async fn failed_person_progress_stays_failed() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(
            &store,
            vec![person("Alice", Some("https://example.com/broken"))],
        );
        let browser = StubBrowser::failing_on("broken");
        let extractor = extractor();
        let cancel = AtomicBool::new(false);

        run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("campaign should tolerate the failure");

        let statuses: Vec<Option<CampaignStatus>> = store
            .progress_log()
            .into_iter()
            .map(|p| p.map(|p| p.status))
            .collect();
        assert!(statuses.contains(&Some(CampaignStatus::Failed)));
        assert!(!statuses.contains(&Some(CampaignStatus::Completed)));
        // The run still ends with the row cleared.
        assert_eq!(statuses.last(), Some(&None));
    }

    #[tokio::test]
    async fn progress_is_written_before_the_source_check() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(&store, vec![person("Alice", None)]);
        let browser = StubBrowser::new();
        let extractor = StubExtractor::new(vec![]);
        let cancel = AtomicBool::new(false);

        run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("campaign should succeed");

        let log = store.progress_log();
        let first = log
            .first()
            .cloned()
            .flatten()
            .expect("first write is a progress row");
        assert_eq!(first.status, CampaignStatus::Navigating);
        assert_eq!(first.current_person_name, "Alice");
        assert_eq!(first.current_person, 1);
        let second = log.get(1).cloned().flatten().expect("second progress row");
        assert_eq!(second.status, CampaignStatus::Completed);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_person() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(
            &store,
            vec![person("Alice", Some("https://example.com/alice"))],
        );
        let browser = StubBrowser::new();
        let extractor = extractor();
        let cancel = AtomicBool::new(true);

        let entries = run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("cancelled campaign still returns cleanly");

        assert!(entries.is_empty());
        let row = store.row(search.id).expect("row exists");
        assert!(row.campaign_progress.is_none());
    }

    #[tokio::test]
    async fn invalid_source_url_is_tolerated() {
        let store = InMemorySearchStore::new();
        let search = seeded_search(&store, vec![person("Alice", Some("not a url"))]);
        let browser = StubBrowser::new();
        let extractor = extractor();
        let cancel = AtomicBool::new(false);

        let entries = run_campaign(&store, &browser, &extractor, &search, &cancel)
            .await
            .expect("campaign should treat a bad URL as a per-person failure");

        assert_eq!(entries.len(), 1);
        assert!(entries[0].summary.is_none());
    }
}
