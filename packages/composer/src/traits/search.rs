//! Web search seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which index a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Web,
    Video,
}

/// One result from a search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    /// Snippet or summary text, used by the ranking prompt.
    pub content: String,
}

/// External search collaborator used by the enrichment stage.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Search the given index, returning up to `max_results` hits.
    async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        max_results: usize,
    ) -> Result<Vec<SearchHit>>;
}
