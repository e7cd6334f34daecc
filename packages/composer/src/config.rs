//! Configuration for the composition pipeline.
//!
//! Every recognized option is an explicit typed field with a default.
//! There is no pass-through settings blob: an option either appears
//! here with a documented effect, or it does not exist.

use serde::{Deserialize, Serialize};

use crate::types::RenderMode;

/// How section images are produced during enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStrategy {
    /// Synthesize an illustration with the generative image backend.
    Generate,
    /// Keyword search against a stock-photo index; reuses the source
    /// URL, nothing is uploaded.
    StockSearch,
    /// No section images.
    Off,
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Section image strategy. Default: `Off`.
    pub image_strategy: ImageStrategy,

    /// Whether ad snippets are inserted after section bodies.
    ///
    /// The first section never carries an ad regardless of this flag.
    /// Default: false.
    pub ads_enabled: bool,

    /// The ad snippet inserted when ads are enabled. An empty script
    /// suppresses ads even when `ads_enabled` is true.
    #[serde(default)]
    pub ad_script: String,

    /// Whether sections get a related external link. Default: true.
    pub related_links: bool,

    /// Whether sections get a related video embed. Default: true.
    pub related_videos: bool,

    /// Candidates fetched per related-link search before ranking.
    /// Default: 5.
    pub link_candidates: usize,

    /// Candidates fetched per related-video search before ranking.
    /// Default: 5.
    pub video_candidates: usize,

    /// Markup rendering for images and videos at assembly time.
    /// Default: `GenericTags`.
    pub render_mode: RenderMode,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            image_strategy: ImageStrategy::Off,
            ads_enabled: false,
            ad_script: String::new(),
            related_links: true,
            related_videos: true,
            link_candidates: 5,
            video_candidates: 5,
            render_mode: RenderMode::GenericTags,
        }
    }
}

impl ComposeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the section image strategy.
    pub fn with_image_strategy(mut self, strategy: ImageStrategy) -> Self {
        self.image_strategy = strategy;
        self
    }

    /// Enable ads with the given snippet.
    pub fn with_ads(mut self, script: impl Into<String>) -> Self {
        self.ads_enabled = true;
        self.ad_script = script.into();
        self
    }

    /// Set the assembly render mode.
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = mode;
        self
    }

    /// True when ads should actually be emitted.
    pub fn ads_active(&self) -> bool {
        self.ads_enabled && !self.ad_script.is_empty()
    }
}
