//! Platform publisher seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AssembledDocument, PublishReceipt};

/// A publishing target for the assembled document.
///
/// Variants form a closed set (REST token platform, OAuth platform,
/// browser-automation platform); each is constructed once per account
/// and passed by reference, never instantiated ad hoc per call.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// Publish the document, returning the live URL.
    async fn publish(&self, doc: &AssembledDocument) -> Result<PublishReceipt>;

    /// Re-host an image on the platform, returning the platform URL.
    ///
    /// Platforms without an image-upload capability keep the default,
    /// which reuses the source URL unchanged.
    async fn upload_image(&self, source_url: &str) -> Result<String> {
        Ok(source_url.to_string())
    }
}
