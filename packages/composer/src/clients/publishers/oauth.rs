//! OAuth platform publisher with a draft-then-publish flow.
//!
//! Access tokens are minted from a long-lived refresh token and cached
//! until shortly before expiry. Publishing creates the post as a draft
//! and flips it public in a second call, which is the only flow the
//! platform's API supports.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ComposeError, Result};
use crate::security::SecretString;
use crate::traits::PlatformPublisher;
use crate::types::{AssembledDocument, PublishReceipt};

/// Refresh the token this long before its reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Credentials for an OAuth platform account.
pub struct OauthAccount {
    pub token_url: String,
    pub api_base_url: String,
    pub blog_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct OauthPublisher {
    client: Client,
    account: OauthAccount,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct DraftResponse {
    id: String,
}

#[derive(Deserialize)]
struct PublishResponse {
    url: String,
}

impl OauthPublisher {
    pub fn new(account: OauthAccount) -> Self {
        Self {
            client: Client::new(),
            account,
            token: Mutex::new(None),
        }
    }

    /// Return a valid access token, refreshing if the cached one is
    /// absent or near expiry.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("refreshing oauth access token");
        let response = self
            .client
            .post(&self.account.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.account.client_id.as_str()),
                ("client_secret", self.account.client_secret.expose()),
                ("refresh_token", self.account.refresh_token.expose()),
            ])
            .send()
            .await
            .map_err(ComposeError::publish)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::publish_msg(format!(
                "token refresh failed with {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(ComposeError::publish)?;
        let access = token.access_token.clone();
        *guard = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access)
    }

    fn posts_url(&self) -> String {
        format!(
            "{}/blogs/{}/posts",
            self.account.api_base_url, self.account.blog_id
        )
    }
}

#[async_trait]
impl PlatformPublisher for OauthPublisher {
    async fn publish(&self, doc: &AssembledDocument) -> Result<PublishReceipt> {
        let token = self.access_token().await?;
        let auth = format!("Bearer {token}");

        let response = self
            .client
            .post(self.posts_url())
            .header("Authorization", &auth)
            .query(&[("isDraft", "true")])
            .json(&serde_json::json!({
                "title": doc.title,
                "content": doc.html,
                "labels": doc.tags,
            }))
            .send()
            .await
            .map_err(ComposeError::publish)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::publish_msg(format!(
                "draft creation failed with {status}: {body}"
            )));
        }
        let draft: DraftResponse = response.json().await.map_err(ComposeError::publish)?;

        let response = self
            .client
            .post(format!("{}/{}/publish", self.posts_url(), draft.id))
            .header("Authorization", &auth)
            .send()
            .await
            .map_err(ComposeError::publish)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::publish_msg(format!(
                "draft publish failed with {status}: {body}"
            )));
        }
        let published: PublishResponse = response.json().await.map_err(ComposeError::publish)?;
        Ok(PublishReceipt { url: published.url })
    }
}
