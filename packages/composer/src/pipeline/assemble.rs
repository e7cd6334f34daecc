//! Stage 5: document assembly.
//!
//! A pure transform of the enriched section list plus a render mode.
//! Sections are emitted in original index order regardless of the
//! order enrichment finished in. Per section the order is: body, ad
//! (if present), related links, image markup, video embeds.

use crate::types::{AssembledDocument, DocumentMeta, RenderMode, Section};

/// Assemble the final document.
pub fn assemble(
    title: &str,
    meta: &DocumentMeta,
    sections: &[Section],
    mode: RenderMode,
) -> AssembledDocument {
    let mut html = String::new();

    if !meta.thumbnail_captions.is_empty() {
        html.push_str("<div class=\"thumbnail\">\n");
        for caption in &meta.thumbnail_captions {
            html.push_str(&format!("<p>{caption}</p>\n"));
        }
        html.push_str("</div>\n");
    }

    html.push_str(&format!(
        "<div class=\"seo\" data-title=\"{}\" data-description=\"{}\"></div>\n",
        meta.seo_title, meta.seo_description
    ));

    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| s.index);

    for section in ordered {
        html.push_str(&format!("<section data-index=\"{}\">\n", section.index));
        html.push_str(&section.html);
        html.push('\n');

        if let Some(ad) = &section.ad_html {
            html.push_str(&format!("<div class=\"ad\">{ad}</div>\n"));
        }

        for link in &section.links {
            html.push_str(&format!(
                "<p class=\"related\"><a href=\"{}\">{}</a></p>\n",
                link.url, link.name
            ));
        }

        if let Some(url) = section.display_image_url() {
            html.push_str(&render_image(url, mode));
            html.push('\n');
        }

        for video in &section.videos {
            html.push_str(&render_video(&video.video_id, mode));
            html.push('\n');
        }

        html.push_str("</section>\n");
    }

    AssembledDocument {
        title: title.to_string(),
        html,
        tags: meta.tags.clone(),
    }
}

fn render_image(url: &str, mode: RenderMode) -> String {
    match mode {
        RenderMode::PlatformEmbed => format!("[image src=\"{url}\"]"),
        RenderMode::GenericTags => format!("<img src=\"{url}\" alt=\"\" />"),
    }
}

fn render_video(video_id: &str, mode: RenderMode) -> String {
    match mode {
        RenderMode::PlatformEmbed => format!("[video id=\"{video_id}\"]"),
        RenderMode::GenericTags => format!(
            "<iframe src=\"https://www.youtube.com/embed/{video_id}\" \
             frameborder=\"0\" allowfullscreen></iframe>"
        ),
    }
}
