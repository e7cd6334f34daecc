//! Section state threaded through the enrichment stages.

use serde::{Deserialize, Serialize};

/// An external link attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedLink {
    pub name: String,
    pub url: String,
}

/// A video attached to a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedVideo {
    pub title: String,
    pub video_id: String,
    pub url: String,
}

/// Outcome of one per-section enrichment operation.
///
/// Enrichment failures are data, not errors: a failed operation
/// degrades to `Degraded { reason }` and the section continues with
/// that field absent. This replaces the implicit
/// absent-value-plus-log-line convention with an explicit result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrichment<T> {
    Ok(T),
    Degraded { reason: String },
}

impl<T> Enrichment<T> {
    /// Convert into the optional value, discarding the reason.
    pub fn into_value(self) -> Option<T> {
        match self {
            Enrichment::Ok(v) => Some(v),
            Enrichment::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Enrichment::Degraded { .. })
    }

    /// Build from a `Result`, stringifying the error as the reason.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Enrichment::Ok(v),
            Err(e) => Enrichment::Degraded {
                reason: e.to_string(),
            },
        }
    }
}

/// One section of the post, mutated in place by each enrichment stage
/// and consumed once by assembly. Never persisted independently of the
/// final assembled document.
#[derive(Debug, Clone, Default)]
pub struct Section {
    /// Position in the original outline order.
    pub index: usize,
    /// Body HTML fragment from the expansion stage.
    pub html: String,
    /// Externally hosted image URL (stock-photo strategy).
    pub image_url: Option<String>,
    /// Locally generated image bytes awaiting upload (AI strategy).
    pub image_bytes: Option<Vec<u8>>,
    /// URL of the image after upload to the per-job asset store.
    pub uploaded_image_url: Option<String>,
    pub links: Vec<RelatedLink>,
    pub videos: Vec<RelatedVideo>,
    pub ad_html: Option<String>,
}

impl Section {
    pub fn new(index: usize, html: String) -> Self {
        Self {
            index,
            html,
            ..Default::default()
        }
    }

    /// The image URL assembly should render: the uploaded copy when the
    /// upload succeeded, otherwise the source URL if one exists.
    pub fn display_image_url(&self) -> Option<&str> {
        self.uploaded_image_url
            .as_deref()
            .or(self.image_url.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrichment_from_ok_result() {
        let e = Enrichment::from_result::<String>(Ok(1));
        assert_eq!(e.into_value(), Some(1));
    }

    #[test]
    fn enrichment_from_err_result_keeps_reason() {
        let e: Enrichment<i32> = Enrichment::from_result(Err("boom".to_string()));
        assert!(e.is_degraded());
        assert_eq!(e.into_value(), None);
    }

    #[test]
    fn display_image_prefers_uploaded_url() {
        let mut section = Section::new(0, "<p>hi</p>".into());
        section.image_url = Some("https://img.example/src.png".into());
        section.uploaded_image_url = Some("https://cdn.example/j/0.png".into());
        assert_eq!(
            section.display_image_url(),
            Some("https://cdn.example/j/0.png")
        );
    }
}
