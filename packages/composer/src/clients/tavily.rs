//! Tavily-backed web and video search.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, Result};
use crate::security::SecretString;
use crate::traits::{SearchHit, SearchKind, WebSearch};

const SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest {
    query: String,
    search_depth: String,
    max_results: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: String,
    content: String,
}

/// Search collaborator backed by the Tavily API.
///
/// Video searches are web searches constrained to the video platform's
/// domain; the enrichment stage filters for embeddable URLs afterwards.
pub struct TavilySearch {
    client: Client,
    api_key: SecretString,
    search_depth: String,
    base_url: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new(api_key),
            search_depth: "basic".to_string(),
            base_url: SEARCH_URL.to_string(),
        }
    }

    /// Set search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        max_results: usize,
    ) -> Result<Vec<SearchHit>> {
        let request = match kind {
            SearchKind::Web => TavilyRequest {
                query: query.to_string(),
                search_depth: self.search_depth.clone(),
                max_results,
                include_domains: Vec::new(),
            },
            SearchKind::Video => TavilyRequest {
                query: query.to_string(),
                search_depth: self.search_depth.clone(),
                max_results,
                include_domains: vec!["youtube.com".to_string()],
            },
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(ComposeError::search)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ComposeError::RateLimited(format!("search: 429: {body}")));
            }
            return Err(ComposeError::search(crate::error::Message(format!(
                "search failed with {status}: {body}"
            ))));
        }

        let parsed: TavilyResponse = response.json().await.map_err(ComposeError::search)?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                content: r.content,
            })
            .collect())
    }
}
