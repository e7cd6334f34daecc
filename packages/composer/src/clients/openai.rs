//! OpenAI-backed text and image generation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ComposeError, Result};
use crate::security::SecretString;
use crate::traits::{ImageGenerator, TextGenerator};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client implementing [`TextGenerator`].
#[derive(Clone)]
pub struct OpenAiText {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OpenAiText {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new(api_key),
            model: "gpt-4o".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for proxies or compatible backends).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiText {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(ComposeError::generation)?;

        let response = check_quota(response, "chat completion").await?;
        let chat: ChatResponse = response.json().await.map_err(ComposeError::generation)?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ComposeError::generation_msg("chat completion returned no choices"))
    }
}

/// Image-generations client implementing [`ImageGenerator`].
///
/// Asks the API for a hosted URL and fetches the bytes in a second
/// request, so image payloads never pass through a base64 decode here.
#[derive(Clone)]
pub struct OpenAiImage {
    client: Client,
    api_key: SecretString,
    model: String,
    size: String,
    base_url: String,
}

#[derive(Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: String,
}

impl OpenAiImage {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new(api_key),
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImage {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let request = ImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.size.clone(),
            response_format: "url",
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&request)
            .send()
            .await
            .map_err(ComposeError::generation)?;

        let response = check_quota(response, "image generation").await?;
        let image: ImageResponse = response.json().await.map_err(ComposeError::generation)?;
        let url = image
            .data
            .into_iter()
            .next()
            .map(|d| d.url)
            .ok_or_else(|| ComposeError::generation_msg("image generation returned no data"))?;

        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ComposeError::generation)?
            .error_for_status()
            .map_err(ComposeError::generation)?
            .bytes()
            .await
            .map_err(ComposeError::generation)?;
        Ok(bytes.to_vec())
    }
}

/// Promote HTTP failures to typed errors, with 429 mapped to the
/// retryable rate-limit class.
async fn check_quota(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ComposeError::RateLimited(format!("{what}: 429: {body}")));
    }
    Err(ComposeError::generation_msg(format!(
        "{what} failed with {status}: {body}"
    )))
}
