//! Stage 3: per-section enrichment fan-out.
//!
//! Every section runs its four enrichment operations (image, related
//! link, related video, ad snippet) independently and in parallel with
//! the other sections. A failure in any one operation degrades that
//! field only: the reason is logged at error level against the owning
//! job and the section continues with the field absent. Nothing in
//! this module can fail the job.

use futures::future::join_all;
use tracing::debug;
use uuid::Uuid;

use crate::config::{ComposeConfig, ImageStrategy};
use crate::error::{ComposeError, Result};
use crate::limiter::RetryExecutor;
use crate::traits::{ImageGenerator, JobLogSink, SearchHit, SearchKind, TextGenerator, WebSearch};
use crate::types::{
    Enrichment, LogLevel, Outline, RelatedLink, RelatedVideo, Section, SectionStub,
};

use super::prompts;

/// Collaborators and gates threaded through the fan-out.
pub(crate) struct EnrichContext<'a> {
    pub text: &'a dyn TextGenerator,
    pub image: &'a dyn ImageGenerator,
    pub search: &'a dyn WebSearch,
    pub logs: &'a dyn JobLogSink,
    pub gen_gate: &'a RetryExecutor,
    pub search_gate: &'a RetryExecutor,
    pub config: &'a ComposeConfig,
    pub job_id: Uuid,
}

/// The outcome of enriching one section, applied back onto it.
#[derive(Default)]
struct SectionPatch {
    image_bytes: Option<Vec<u8>>,
    image_url: Option<String>,
    link: Option<RelatedLink>,
    video: Option<RelatedVideo>,
    ad_html: Option<String>,
}

/// Run enrichment for all sections concurrently, mutating them in
/// place. Completion order is irrelevant: results are applied by
/// position, and assembly re-reads sections in index order anyway.
pub(crate) async fn enrich_sections(
    ctx: &EnrichContext<'_>,
    outline: &Outline,
    sections: &mut [Section],
) {
    let patches = join_all(
        outline
            .sections
            .iter()
            .enumerate()
            .map(|(index, stub)| enrich_one(ctx, index, stub)),
    )
    .await;

    for (section, patch) in sections.iter_mut().zip(patches) {
        section.image_bytes = patch.image_bytes;
        section.image_url = patch.image_url;
        section.links.extend(patch.link);
        section.videos.extend(patch.video);
        section.ad_html = patch.ad_html;
    }
}

async fn enrich_one(ctx: &EnrichContext<'_>, index: usize, stub: &SectionStub) -> SectionPatch {
    let (image, link, video) = futures::join!(
        section_image(ctx, stub),
        related_link(ctx, stub),
        related_video(ctx, stub),
    );

    let mut patch = SectionPatch {
        // Ads come from configuration, not a collaborator; the first
        // section never carries one.
        ad_html: (index != 0 && ctx.config.ads_active())
            .then(|| ctx.config.ad_script.clone()),
        ..Default::default()
    };

    match image {
        Enrichment::Ok(SectionImage::Generated(bytes)) => patch.image_bytes = Some(bytes),
        Enrichment::Ok(SectionImage::Stock(url)) => patch.image_url = Some(url),
        Enrichment::Ok(SectionImage::None) => {}
        Enrichment::Degraded { reason } => {
            degrade(ctx, index, "image", &reason).await;
        }
    }

    match link {
        Enrichment::Ok(link) => patch.link = link,
        Enrichment::Degraded { reason } => {
            degrade(ctx, index, "related link", &reason).await;
        }
    }

    match video {
        Enrichment::Ok(video) => patch.video = video,
        Enrichment::Degraded { reason } => {
            degrade(ctx, index, "related video", &reason).await;
        }
    }

    debug!(section = index, "section enrichment finished");
    patch
}

async fn degrade(ctx: &EnrichContext<'_>, index: usize, what: &str, reason: &str) {
    ctx.logs
        .append(
            ctx.job_id,
            LogLevel::Error,
            &format!("section {index}: {what} degraded: {reason}"),
        )
        .await;
}

enum SectionImage {
    Generated(Vec<u8>),
    Stock(String),
    None,
}

async fn section_image(ctx: &EnrichContext<'_>, stub: &SectionStub) -> Enrichment<SectionImage> {
    match ctx.config.image_strategy {
        ImageStrategy::Off => Enrichment::Ok(SectionImage::None),
        ImageStrategy::Generate => {
            let prompt = prompts::section_image(stub);
            Enrichment::from_result(
                ctx.gen_gate
                    .run(|| ctx.image.generate(&prompt))
                    .await
                    .map(SectionImage::Generated),
            )
        }
        ImageStrategy::StockSearch => {
            let query = format!("{} photo", stub.title);
            let result = ctx
                .search_gate
                .run(|| ctx.search.search(&query, SearchKind::Web, 1))
                .await
                .map(|hits| match hits.into_iter().next() {
                    Some(hit) => SectionImage::Stock(hit.url),
                    None => SectionImage::None,
                });
            Enrichment::from_result(result)
        }
    }
}

async fn related_link(
    ctx: &EnrichContext<'_>,
    stub: &SectionStub,
) -> Enrichment<Option<RelatedLink>> {
    if !ctx.config.related_links {
        return Enrichment::Ok(None);
    }

    let result: Result<Option<RelatedLink>> = async {
        let hits = ctx
            .search_gate
            .run(|| {
                ctx.search
                    .search(&stub.title, SearchKind::Web, ctx.config.link_candidates)
            })
            .await?;
        if hits.is_empty() {
            return Ok(None);
        }
        let best = rank(ctx, stub, &hits).await?;
        Ok(Some(RelatedLink {
            name: best.title.clone(),
            url: best.url.clone(),
        }))
    }
    .await;

    Enrichment::from_result(result)
}

async fn related_video(
    ctx: &EnrichContext<'_>,
    stub: &SectionStub,
) -> Enrichment<Option<RelatedVideo>> {
    if !ctx.config.related_videos {
        return Enrichment::Ok(None);
    }

    let result: Result<Option<RelatedVideo>> = async {
        let hits = ctx
            .search_gate
            .run(|| {
                ctx.search
                    .search(&stub.title, SearchKind::Video, ctx.config.video_candidates)
            })
            .await?;
        // Only candidates we can embed are worth ranking.
        let embeddable: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| video_id(&hit.url).is_some())
            .collect();
        if embeddable.is_empty() {
            return Ok(None);
        }
        let best = rank(ctx, stub, &embeddable).await?;
        let id = video_id(&best.url)
            .ok_or_else(|| ComposeError::generation_msg("ranked video lost its id"))?;
        Ok(Some(RelatedVideo {
            title: best.title.clone(),
            video_id: id,
            url: best.url.clone(),
        }))
    }
    .await;

    Enrichment::from_result(result)
}

/// Rank candidates with a generative call; returns the chosen hit.
async fn rank<'h>(
    ctx: &EnrichContext<'_>,
    stub: &SectionStub,
    hits: &'h [SearchHit],
) -> Result<&'h SearchHit> {
    let prompt = prompts::rank_candidates(stub, hits);
    let value = ctx.gen_gate.run(|| ctx.text.generate_json(&prompt)).await?;
    let best = value
        .get("best")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ComposeError::generation_msg("ranking reply missing \"best\" index"))?;
    hits.get(best as usize)
        .ok_or_else(|| ComposeError::generation_msg("ranking reply index out of range"))
}

/// Extract a YouTube video id from a watch or short URL.
pub(crate) fn video_id(url: &str) -> Option<String> {
    let id = if let Some(rest) = url.split("watch?v=").nth(1) {
        rest.split(['&', '#']).next()
    } else if let Some(rest) = url.split("youtu.be/").nth(1) {
        rest.split(['?', '#']).next()
    } else {
        None
    }?;
    (!id.is_empty()).then(|| id.to_string())
}
