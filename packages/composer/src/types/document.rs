//! Assembled document and pipeline outputs.

use serde::{Deserialize, Serialize};

/// How image and video markup is rendered during assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Inline platform-specific embed codes (shortcode syntax the
    /// target editor expands on its side).
    PlatformEmbed,
    /// Plain `<img>` / `<iframe>` tags.
    GenericTags,
}

/// The publishable document produced by the assembly stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub title: String,
    pub html: String,
    pub tags: Vec<String>,
}

/// What a platform publisher returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub url: String,
}

/// Final outcome of a pipeline run, consumed by the scheduler to
/// finalize the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub result_url: String,
    pub result_msg: String,
}
