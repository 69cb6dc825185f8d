//! Web search client.
//!
//! Thin wrapper over a Tavily-style JSON search API: query in, ordered
//! list of scored results out. Rate limiting toward the provider is
//! advisory (the search stage sleeps between calls); the client itself
//! performs no retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::artifacts::SearchHit;
use crate::config::Config;
use crate::error::SearchError;

/// Query string in, ordered scored results out, bounded result count.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, SearchError>;
}

/// Client for the Tavily search API.
pub struct TavilyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl TavilyClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.search_api_key.clone(),
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            timeout: config.search_timeout,
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<ProviderResult>,
}

#[derive(Debug, Deserialize)]
struct ProviderResult {
    title: String,
    url: String,
    score: f64,

    #[serde(default)]
    published_date: Option<String>,

    #[serde(default)]
    author: Option<String>,
}

impl From<ProviderResult> for SearchHit {
    fn from(result: ProviderResult) -> Self {
        SearchHit {
            url: result.url,
            title: result.title,
            relevance_score: result.score,
            published_date: result.published_date,
            author: result.author,
        }
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query = %query, max_results, "searching");

        let request = SearchRequest { query, max_results };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else if e.is_connect() {
                    SearchError::Connection(e.to_string())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let body: SearchResponse = response
                .json()
                .await
                .map_err(|e| SearchError::Parse(e.to_string()))?;
            return Ok(body.results.into_iter().map(SearchHit::from).collect());
        }

        let error_text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(SearchError::Unauthorized),
            429 => Err(SearchError::RateLimited),
            400 => Err(SearchError::BadRequest(error_text)),
            500..=599 => Err(SearchError::ServerError(status.as_u16(), error_text)),
            _ => Err(SearchError::HttpStatus(status.as_u16(), error_text)),
        }
    }
}
