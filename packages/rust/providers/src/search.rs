//! Search-provider collaborator backed by the Tavily API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use researcher_shared::{ResearcherError, Result, SearchConfig, SearchHit, read_api_key};

use crate::USER_AGENT;

/// Anything that can answer a web-search query.
///
/// Timeouts are the caller's concern; implementations may block for as long
/// as the underlying transport allows.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Tavily search depth.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    fn from_config(value: &str) -> Self {
        match value {
            "advanced" => Self::Advanced,
            _ => Self::Basic,
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// Tavily API client for web search.
#[derive(Clone)]
pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
    depth: SearchDepth,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ResearcherError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: "https://api.tavily.com".to_string(),
            depth: SearchDepth::Basic,
        })
    }

    /// Build from the `[search]` config section, reading the key from its env var.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = read_api_key(&config.api_key_env).ok_or_else(|| {
            ResearcherError::config(format!(
                "search API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;

        let mut search = Self::new(api_key)?.with_base_url(&config.base_url);
        search.depth = SearchDepth::from_config(&config.search_depth);
        Ok(search)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: self.depth,
            max_results,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ResearcherError::Network(format!("search request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ResearcherError::Search(format!("HTTP {status}: {snippet}")));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| ResearcherError::parse(format!("search response: {e}")))?;

        let hits: Vec<SearchHit> = parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect();

        debug!(results = hits.len(), "search complete");
        Ok(hits)
    }
}
