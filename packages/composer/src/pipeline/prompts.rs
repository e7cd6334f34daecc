//! Prompt construction for the generative stages.
//!
//! Prompts ask for JSON matching the serde types in `crate::types`;
//! the reply shape is part of the contract stated in each prompt.

use crate::traits::SearchHit;
use crate::types::{Brief, Outline, SectionStub};

/// Stage 1: brief -> ordered section stubs.
pub fn outline(brief: &Brief) -> String {
    format!(
        "You are planning a blog post.\n\
         Title: {title}\n\
         Brief: {brief}\n\n\
         Produce an outline of 3 to 8 sections. Reply with JSON only:\n\
         {{\"title\": \"...\", \"sections\": [{{\"title\": \"...\", \
         \"summary\": \"...\", \"target_words\": 300}}]}}",
        title = brief.title,
        brief = brief.brief,
    )
}

/// Stage 2: outline -> section bodies plus document metadata.
pub fn body(outline: &Outline) -> String {
    let plan = outline
        .sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{i}. {}: {} (~{} words)", s.title, s.summary, s.target_words))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Write the blog post \"{title}\" from this outline:\n{plan}\n\n\
         Reply with JSON only:\n\
         {{\"sections\": [\"<h2>...</h2><p>...</p>\", ...],\n\
         \"meta\": {{\"seo_title\": \"...\", \"seo_description\": \"...\",\n\
         \"tags\": [\"...\"], \"thumbnail_captions\": [\"...\"]}}}}\n\
         One HTML fragment per outline section, in order.",
        title = outline.title,
    )
}

/// Stage 3: illustration prompt for one section.
pub fn section_image(stub: &SectionStub) -> String {
    format!(
        "Blog illustration, clean editorial style, no text overlay: {}. {}",
        stub.title, stub.summary
    )
}

/// Stage 3: pick the best candidate for a section, by index.
pub fn rank_candidates(stub: &SectionStub, hits: &[SearchHit]) -> String {
    let listing = hits
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{i}. {}: {}", h.title, h.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "A blog section is titled \"{}\" ({}).\n\
         Candidates:\n{listing}\n\n\
         Pick the single most relevant candidate. Reply with JSON only: \
         {{\"best\": <index>}}",
        stub.title, stub.summary,
    )
}
