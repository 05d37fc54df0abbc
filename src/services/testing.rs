//! Deterministic stand-ins for the external collaborators, used by the
//! orchestrator tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::dal::SearchStore;
use crate::domain::campaign::{CampaignEntry, CampaignProgress};
use crate::domain::category::SearchData;
use crate::domain::search::PersistedSearch;

use super::droid::Browser;
use super::exa_client::{SearchHit, WebSearcher};
use super::openai_client::Extractor;

/// Replies with the first canned value whose marker appears in the prompt.
pub struct StubExtractor {
    responses: Vec<(String, serde_json::Value)>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn new(responses: Vec<(&str, serde_json::Value)>) -> Self {
        StubExtractor {
            responses: responses
                .into_iter()
                .map(|(marker, value)| (marker.to_string(), value))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract_json(
        &self,
        prompt: &str,
        _system: Option<&str>,
    ) -> Result<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (marker, value) in &self.responses {
            if prompt.contains(marker.as_str()) {
                return Ok(value.clone());
            }
        }
        let preview: String = prompt.chars().take(80).collect();
        bail!("no stub response matches prompt: {preview}")
    }
}

/// Returns the same hits for every query, recording what was asked.
pub struct StubSearcher {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<String>>,
}

impl StubSearcher {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        StubSearcher {
            hits,
            queries: Mutex::new(vec![]),
        }
    }

    pub fn hit(title: &str, url: &str, text: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            text: text.to_string(),
            published_date: None,
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl WebSearcher for StubSearcher {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.queries
            .lock()
            .expect("lock poisoned")
            .push(query.to_string());
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Fails navigation for URLs containing the configured marker, otherwise
/// serves a synthetic page for the current URL.
pub struct StubBrowser {
    fail_on: Option<String>,
    current: Mutex<Option<String>>,
}

impl StubBrowser {
    pub fn new() -> Self {
        StubBrowser {
            fail_on: None,
            current: Mutex::new(None),
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        StubBrowser {
            fail_on: Some(marker.to_string()),
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Browser for StubBrowser {
    async fn navigate(&self, url: &str, _timeout: std::time::Duration) -> Result<()> {
        if let Some(marker) = &self.fail_on {
            if url.contains(marker.as_str()) {
                bail!("navigation failed for {url}");
            }
        }
        *self.current.lock().expect("lock poisoned") = Some(url.to_string());
        Ok(())
    }

    async fn page_text(&self) -> Result<String> {
        let current = self.current.lock().expect("lock poisoned").clone();
        let url = current.context("no page navigated")?;
        Ok(format!("Visible text of {url}"))
    }
}

/// In-memory search store backing orchestrator tests. Progress writes are
/// recorded in order so tests can assert on the status sequence.
pub struct InMemorySearchStore {
    rows: Mutex<HashMap<Uuid, PersistedSearch>>,
    progress_log: Mutex<Vec<Option<CampaignProgress>>>,
}

impl InMemorySearchStore {
    pub fn new() -> Self {
        InMemorySearchStore {
            rows: Mutex::new(HashMap::new()),
            progress_log: Mutex::new(vec![]),
        }
    }

    pub fn progress_log(&self) -> Vec<Option<CampaignProgress>> {
        self.progress_log.lock().expect("lock poisoned").clone()
    }

    pub fn seed(&self, search: PersistedSearch) {
        self.rows
            .lock()
            .expect("lock poisoned")
            .insert(search.id, search);
    }

    pub fn row(&self, id: Uuid) -> Option<PersistedSearch> {
        self.rows.lock().expect("lock poisoned").get(&id).cloned()
    }
}

#[async_trait]
impl SearchStore for InMemorySearchStore {
    async fn get_search(&self, id: Uuid, user_id: Uuid) -> Result<Option<PersistedSearch>> {
        Ok(self
            .rows
            .lock()
            .expect("lock poisoned")
            .get(&id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn list_searches(&self, user_id: Uuid) -> Result<Vec<PersistedSearch>> {
        let mut searches: Vec<PersistedSearch> = self
            .rows
            .lock()
            .expect("lock poisoned")
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        searches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(searches)
    }

    async fn create_search(
        &self,
        user_id: Uuid,
        query: &str,
        search_data: &SearchData,
    ) -> Result<PersistedSearch> {
        let search = PersistedSearch {
            id: Uuid::new_v4(),
            user_id,
            query: query.to_string(),
            search_data: search_data.clone(),
            campaign: None,
            campaign_progress: None,
            created_at: Utc::now(),
        };
        self.seed(search.clone());
        Ok(search)
    }

    async fn update_campaign(
        &self,
        id: Uuid,
        user_id: Uuid,
        entries: &[CampaignEntry],
    ) -> Result<()> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        if let Some(search) = rows.get_mut(&id).filter(|s| s.user_id == user_id) {
            search.campaign = Some(entries.to_vec());
        }
        Ok(())
    }

    async fn update_campaign_progress(
        &self,
        id: Uuid,
        user_id: Uuid,
        progress: Option<&CampaignProgress>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().expect("lock poisoned");
        if let Some(search) = rows.get_mut(&id).filter(|s| s.user_id == user_id) {
            search.campaign_progress = progress.cloned();
        }
        self.progress_log
            .lock()
            .expect("lock poisoned")
            .push(progress.cloned());
        Ok(())
    }
}
