//! Asset store seam.

use async_trait::async_trait;

use crate::error::Result;

/// Object store for uploaded images.
///
/// Keys are prefixed with the owning job's id (`{job_id}/...`), which
/// is what makes prefix deletion a usable compensating action.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload bytes under the given key, returning the public URL.
    async fn upload(&self, bytes: &[u8], key: &str) -> Result<String>;

    /// Delete every object whose key starts with `prefix`.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<()>;
}
