use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One retrieved web result, body text already fetched.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub text: String,
    pub published_date: Option<String>,
}

/// Web-search seam. Implementations must fetch fresh page content, never a
/// stale cache.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Exa search client with content retrieval.
pub struct ExaClient {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaRequest<'a> {
    query: &'a str,
    num_results: usize,
    livecrawl: &'static str,
    contents: ExaContents,
}

#[derive(Serialize)]
struct ExaContents {
    text: bool,
}

#[derive(Deserialize)]
struct ExaResponse {
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    published_date: Option<String>,
}

impl ExaClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(ExaClient { api_key, client })
    }
}

#[async_trait]
impl WebSearcher for ExaClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = ExaRequest {
            query,
            num_results: max_results,
            livecrawl: "always",
            contents: ExaContents { text: true },
        };

        let response = self
            .client
            .post("https://api.exa.ai/search")
            .header("x-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send Exa search request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Exa API error {}: {}", status, body);
        }

        let exa_response: ExaResponse = response
            .json()
            .await
            .context("Failed to parse Exa response")?;

        let hits = exa_response
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                url: r.url,
                text: r.text,
                published_date: r.published_date,
            })
            .collect();

        Ok(hits)
    }
}
