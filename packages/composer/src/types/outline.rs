//! Outline and body-expansion payloads exchanged with the generative
//! backend. These deserialize directly from the model's JSON reply.

use serde::{Deserialize, Serialize};

/// One planned section from the outline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStub {
    pub title: String,
    pub summary: String,
    /// Requested body length for the expansion stage.
    #[serde(default = "default_target_words")]
    pub target_words: u32,
}

fn default_target_words() -> u32 {
    300
}

/// Ordered plan for the post produced by stage 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<SectionStub>,
}

/// Document-level metadata produced alongside the section bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub seo_title: String,
    pub seo_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Caption lines for the thumbnail block.
    #[serde(default)]
    pub thumbnail_captions: Vec<String>,
}

/// Full output of the body-expansion stage: one HTML fragment per
/// outline section, in outline order, plus document metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedBody {
    pub sections: Vec<String>,
    pub meta: DocumentMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_deserializes_with_default_length() {
        let raw = r#"{"title":"T","sections":[{"title":"a","summary":"b"}]}"#;
        let outline: Outline = serde_json::from_str(raw).unwrap();
        assert_eq!(outline.sections[0].target_words, 300);
    }

    #[test]
    fn expanded_body_deserializes() {
        let raw = r#"{
            "sections": ["<p>one</p>", "<p>two</p>"],
            "meta": {"seo_title": "t", "seo_description": "d", "tags": ["x"]}
        }"#;
        let body: ExpandedBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.sections.len(), 2);
        assert!(body.meta.thumbnail_captions.is_empty());
    }
}
