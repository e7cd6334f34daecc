//! Browser-automation platform publisher.
//!
//! For platforms with no usable write API. The driver owns login and
//! editor automation; this module owns the session lifecycle: prepare
//! is idempotent, every publish runs against a scoped session handle,
//! and the session is closed on every exit path including failures.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{ComposeError, Result};
use crate::traits::PlatformPublisher;
use crate::types::{AssembledDocument, PublishReceipt};

/// Handle to one live browser session. Only valid for the driver that
/// issued it.
pub struct BrowserSession {
    pub id: String,
}

/// Automation backend for one browser-published platform.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open (or reuse) a logged-in session. Must be idempotent: calling
    /// it while a session is already prepared returns a handle to that
    /// session rather than spawning another login.
    async fn open(&self) -> Result<BrowserSession>;

    /// Drive the platform's editor to publish the document, returning
    /// the live URL.
    async fn compose(&self, session: &BrowserSession, doc: &AssembledDocument) -> Result<String>;

    /// Tear the session down.
    async fn close(&self, session: BrowserSession) -> Result<()>;
}

pub struct BrowserPublisher {
    driver: Arc<dyn BrowserDriver>,
}

impl BrowserPublisher {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }
}

#[async_trait]
impl PlatformPublisher for BrowserPublisher {
    async fn publish(&self, doc: &AssembledDocument) -> Result<PublishReceipt> {
        let session = self.driver.open().await.map_err(into_publish)?;

        let outcome = self.driver.compose(&session, doc).await;

        // Close before surfacing the outcome so a failed compose never
        // leaks the session.
        if let Err(e) = self.driver.close(session).await {
            warn!(error = %e, "browser session close failed");
        }

        let url = outcome.map_err(into_publish)?;
        Ok(PublishReceipt { url })
    }
}

/// Driver errors are publish failures unless already classed as
/// rate-limiting or misconfiguration.
fn into_publish(e: ComposeError) -> ComposeError {
    match e {
        ComposeError::RateLimited(_) | ComposeError::Configuration(_) | ComposeError::Publish(_) => {
            e
        }
        other => ComposeError::publish_msg(other.to_string()),
    }
}
