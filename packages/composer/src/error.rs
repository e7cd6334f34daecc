//! Typed errors for the composition pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! match on the failure class. Per-section enrichment failures are not
//! errors at all: they are `Enrichment::Degraded` values (see
//! [`crate::types::Enrichment`]) and never propagate past the fan-out
//! stage.

use thiserror::Error;

/// Errors surfaced by the composition pipeline.
///
/// Only job-fatal conditions appear here. `Generation` aborts the
/// pipeline with no partial output; `Publish` additionally triggers
/// asset compensation for anything uploaded under the job's prefix.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// No usable account / collaborator configuration. Not retryable
    /// without an operator fix.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Outline or body generation failed (stage 1/2).
    #[error("generation failed: {0}")]
    Generation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The provider signalled a quota / 429 condition. Retryable via
    /// backoff; terminal only once the retry budget is exhausted.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A search call failed (enrichment input; degradable at the
    /// fan-out boundary).
    #[error("search failed: {0}")]
    Search(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The publish step failed (stage 6).
    #[error("publish failed: {0}")]
    Publish(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Asset store rejected an operation outside the degradable upload
    /// path (e.g. compensation delete).
    #[error("asset store error: {0}")]
    AssetStore(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The generative backend returned JSON we could not parse.
    #[error("malformed model response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Plain-text error used where a failure has no underlying source.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Message(pub String);

impl ComposeError {
    /// Wrap an arbitrary error as a generation failure.
    pub fn generation<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ComposeError::Generation(Box::new(err))
    }

    /// A generation failure with a plain-text reason.
    pub fn generation_msg(msg: impl Into<String>) -> Self {
        ComposeError::Generation(Box::new(Message(msg.into())))
    }

    /// A publish failure with a plain-text reason.
    pub fn publish_msg(msg: impl Into<String>) -> Self {
        ComposeError::Publish(Box::new(Message(msg.into())))
    }

    /// Wrap an arbitrary error as a publish failure.
    pub fn publish<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ComposeError::Publish(Box::new(err))
    }

    /// Wrap an arbitrary error as a search failure.
    pub fn search<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ComposeError::Search(Box::new(err))
    }

    /// Wrap an arbitrary error as an asset store failure.
    pub fn asset_store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ComposeError::AssetStore(Box::new(err))
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, ComposeError>;
