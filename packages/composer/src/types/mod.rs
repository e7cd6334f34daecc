//! Core types for the composition pipeline.

mod document;
mod outline;
mod section;

pub use document::{AssembledDocument, PipelineResult, PublishReceipt, RenderMode};
pub use outline::{DocumentMeta, ExpandedBody, Outline, SectionStub};
pub use section::{Enrichment, RelatedLink, RelatedVideo, Section};

use serde::{Deserialize, Serialize};

/// Severity of a job log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// The content brief a pipeline run starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
    /// Working title for the post.
    pub title: String,
    /// Free-text description of what the post should cover.
    pub brief: String,
}
