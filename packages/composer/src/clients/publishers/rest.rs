//! Token-authenticated REST platform publisher.
//!
//! The platform exposes a posts endpoint and a media endpoint; both
//! take a bearer token. This is the only variant with a real image
//! re-host capability.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, Message, Result};
use crate::security::SecretString;
use crate::traits::PlatformPublisher;
use crate::types::{AssembledDocument, PublishReceipt};

/// Credentials for a REST platform account.
pub struct RestAccount {
    pub base_url: String,
    pub token: SecretString,
}

impl RestAccount {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: SecretString::new(token),
        }
    }
}

pub struct RestPublisher {
    client: Client,
    account: RestAccount,
}

#[derive(Serialize)]
struct PostRequest<'a> {
    title: &'a str,
    content: &'a str,
    tags: &'a [String],
    status: &'static str,
}

#[derive(Deserialize)]
struct PostResponse {
    link: String,
}

#[derive(Deserialize)]
struct MediaResponse {
    source_url: String,
}

impl RestPublisher {
    pub fn new(account: RestAccount) -> Self {
        Self {
            client: Client::new(),
            account,
        }
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.account.token.expose())
    }
}

#[async_trait]
impl PlatformPublisher for RestPublisher {
    async fn publish(&self, doc: &AssembledDocument) -> Result<PublishReceipt> {
        let request = PostRequest {
            title: &doc.title,
            content: &doc.html,
            tags: &doc.tags,
            status: "publish",
        };

        let response = self
            .client
            .post(format!("{}/posts", self.account.base_url))
            .header("Authorization", self.auth())
            .json(&request)
            .send()
            .await
            .map_err(ComposeError::publish)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::publish_msg(format!(
                "post creation failed with {status}: {body}"
            )));
        }

        let post: PostResponse = response.json().await.map_err(ComposeError::publish)?;
        Ok(PublishReceipt { url: post.link })
    }

    async fn upload_image(&self, source_url: &str) -> Result<String> {
        // The media endpoint takes raw bytes, so fetch the stored copy
        // first.
        let bytes = self
            .client
            .get(source_url)
            .send()
            .await
            .map_err(ComposeError::publish)?
            .error_for_status()
            .map_err(ComposeError::publish)?
            .bytes()
            .await
            .map_err(ComposeError::publish)?;

        let filename = source_url.rsplit('/').next().unwrap_or("image.png");
        let response = self
            .client
            .post(format!("{}/media", self.account.base_url))
            .header("Authorization", self.auth())
            .header("Content-Type", "image/png")
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{filename}\""),
            )
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(ComposeError::publish)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::publish(Message(format!(
                "media upload failed with {status}: {body}"
            ))));
        }

        let media: MediaResponse = response.json().await.map_err(ComposeError::publish)?;
        Ok(media.source_url)
    }
}
