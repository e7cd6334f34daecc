//! Stages 1 and 2: outline generation and body expansion.
//!
//! Both are single generative calls. Failures here are fatal to the
//! job: the pipeline aborts with no partial output.

use tracing::debug;

use crate::error::{ComposeError, Result};
use crate::limiter::RetryExecutor;
use crate::traits::TextGenerator;
use crate::types::{Brief, ExpandedBody, Outline};

use super::prompts;

/// Turn `(title, brief)` into an ordered list of section stubs.
pub(crate) async fn generate_outline(
    text: &dyn TextGenerator,
    gate: &RetryExecutor,
    brief: &Brief,
) -> Result<Outline> {
    let prompt = prompts::outline(brief);
    let value = gate.run(|| text.generate_json(&prompt)).await?;
    let outline: Outline = serde_json::from_value(value)?;

    if outline.sections.is_empty() {
        return Err(ComposeError::generation_msg(
            "outline stage returned no sections",
        ));
    }

    debug!(sections = outline.sections.len(), "outline generated");
    Ok(outline)
}

/// Turn the outline into full section bodies plus document metadata.
pub(crate) async fn expand_body(
    text: &dyn TextGenerator,
    gate: &RetryExecutor,
    outline: &Outline,
) -> Result<ExpandedBody> {
    let prompt = prompts::body(outline);
    let value = gate.run(|| text.generate_json(&prompt)).await?;
    let body: ExpandedBody = serde_json::from_value(value)?;

    if body.sections.len() != outline.sections.len() {
        return Err(ComposeError::generation_msg(format!(
            "body stage returned {} sections for a {}-section outline",
            body.sections.len(),
            outline.sections.len()
        )));
    }

    debug!(sections = body.sections.len(), "body expanded");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTextGenerator;
    use std::time::Duration;

    fn gate() -> RetryExecutor {
        RetryExecutor::new("test-gen", 3, Duration::from_millis(1))
    }

    fn brief() -> Brief {
        Brief {
            title: "Rust pipelines".into(),
            brief: "How to structure multi-stage pipelines".into(),
        }
    }

    #[tokio::test]
    async fn outline_parses_model_reply() {
        let text = MockTextGenerator::new().with_reply(
            "outline",
            r#"{"title":"Rust pipelines","sections":[
                {"title":"Intro","summary":"why","target_words":200},
                {"title":"Stages","summary":"how","target_words":400}
            ]}"#,
        );
        let outline = generate_outline(&text, &gate(), &brief()).await.unwrap();
        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[1].title, "Stages");
    }

    #[tokio::test]
    async fn empty_outline_is_a_generation_failure() {
        let text = MockTextGenerator::new()
            .with_reply("outline", r#"{"title":"t","sections":[]}"#);
        let err = generate_outline(&text, &gate(), &brief()).await.unwrap_err();
        assert!(matches!(err, ComposeError::Generation(_)));
    }

    #[tokio::test]
    async fn section_count_mismatch_is_fatal() {
        let text = MockTextGenerator::new().with_reply(
            "outline",
            r#"{"sections":["<p>only one</p>"],"meta":{"seo_title":"t","seo_description":"d"}}"#,
        );
        let outline = Outline {
            title: "t".into(),
            sections: vec![
                crate::types::SectionStub {
                    title: "a".into(),
                    summary: "s".into(),
                    target_words: 100,
                },
                crate::types::SectionStub {
                    title: "b".into(),
                    summary: "s".into(),
                    target_words: 100,
                },
            ],
        };
        let err = expand_body(&text, &gate(), &outline).await.unwrap_err();
        assert!(matches!(err, ComposeError::Generation(_)));
    }
}
