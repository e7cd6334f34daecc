//! HTTP object-store client for uploaded images.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{ComposeError, Message, Result};
use crate::security::SecretString;
use crate::traits::AssetStore;

/// Asset store speaking a plain HTTP object API: `PUT {base}/{key}`
/// uploads, `DELETE {base}?prefix={prefix}` removes a whole key prefix.
/// Uploaded objects are readable at `{public_base}/{key}`.
pub struct HttpAssetStore {
    client: Client,
    base_url: String,
    public_base_url: String,
    token: SecretString,
}

impl HttpAssetStore {
    pub fn new(
        base_url: impl Into<String>,
        public_base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_slash(base_url.into()),
            public_base_url: trim_slash(public_base_url.into()),
            token: SecretString::new(token),
        }
    }
}

fn trim_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[async_trait]
impl AssetStore for HttpAssetStore {
    async fn upload(&self, bytes: &[u8], key: &str) -> Result<String> {
        let response = self
            .client
            .put(format!("{}/{key}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.token.expose()))
            .header("Content-Type", "image/png")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(ComposeError::asset_store)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::asset_store(Message(format!(
                "upload of {key} failed with {status}: {body}"
            ))));
        }
        Ok(format!("{}/{key}", self.public_base_url))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<()> {
        let response = self
            .client
            .delete(&self.base_url)
            .query(&[("prefix", prefix)])
            .header("Authorization", format!("Bearer {}", self.token.expose()))
            .send()
            .await
            .map_err(ComposeError::asset_store)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::asset_store(Message(format!(
                "prefix delete of {prefix} failed with {status}: {body}"
            ))));
        }
        Ok(())
    }
}
