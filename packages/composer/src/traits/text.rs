//! Generative backend seams.

use async_trait::async_trait;

use crate::error::Result;

/// Generative text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt, returning the raw text response.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt expecting a JSON reply, returning the parsed
    /// value. The default implementation strips Markdown code fences
    /// before parsing, which is how most chat backends wrap JSON.
    async fn generate_json(&self, prompt: &str) -> Result<serde_json::Value> {
        let raw = self.generate(prompt).await?;
        let trimmed = strip_code_fence(&raw);
        Ok(serde_json::from_str(trimmed)?)
    }
}

/// Generative image backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Synthesize an image for the prompt, returning encoded bytes.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// Strip a surrounding ```json ... ``` fence if present.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn leaves_bare_json_alone() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }
}
