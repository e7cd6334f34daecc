//! The composition pipeline.
//!
//! Stages run in order: outline, body expansion, per-section enrichment
//! (parallel fan-out), asset upload, assembly, publish. Stage failures
//! before the fan-out are fatal with no partial output; enrichment
//! failures degrade single fields; a publish failure after uploads
//! triggers the compensating prefix delete before the error surfaces.

mod assemble;
mod assets;
mod enrich;
mod outline;
pub(crate) mod prompts;

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::ComposeConfig;
use crate::error::Result;
use crate::limiter::RetryExecutor;
use crate::traits::{
    AssetStore, ImageGenerator, JobLogSink, PlatformPublisher, TextGenerator, WebSearch,
};
use crate::types::{Brief, LogLevel, PipelineResult, Section};

pub use assemble::assemble;

/// Everything a pipeline run needs: collaborators behind their trait
/// seams plus the shared admission gates. Gates are per resource class
/// and shared across concurrent runs; cloning `ComposeDeps` clones the
/// handles, not the limiters.
#[derive(Clone)]
pub struct ComposeDeps {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub search: Arc<dyn WebSearch>,
    pub assets: Arc<dyn AssetStore>,
    pub publisher: Arc<dyn PlatformPublisher>,
    pub logs: Arc<dyn JobLogSink>,
    /// Gate for generative calls (text and image).
    pub gen_gate: Arc<RetryExecutor>,
    /// Gate for search calls.
    pub search_gate: Arc<RetryExecutor>,
}

/// One configured pipeline, reusable across runs.
pub struct ContentPipeline {
    deps: ComposeDeps,
    config: ComposeConfig,
}

impl ContentPipeline {
    pub fn new(deps: ComposeDeps, config: ComposeConfig) -> Self {
        Self { deps, config }
    }

    /// Run the full pipeline for one job.
    ///
    /// A retried job re-enters here from the top; no stage output from
    /// a failed run is reused.
    pub async fn run(&self, job_id: Uuid, brief: &Brief) -> Result<PipelineResult> {
        let d = &self.deps;

        info!(job_id = %job_id, title = %brief.title, "pipeline starting");
        d.logs
            .append(job_id, LogLevel::Info, "composing outline")
            .await;
        let outline = outline::generate_outline(&*d.text, &d.gen_gate, brief).await?;

        d.logs
            .append(
                job_id,
                LogLevel::Info,
                &format!("expanding {} sections", outline.sections.len()),
            )
            .await;
        let body = outline::expand_body(&*d.text, &d.gen_gate, &outline).await?;

        let mut sections: Vec<Section> = body
            .sections
            .iter()
            .enumerate()
            .map(|(index, html)| Section::new(index, html.clone()))
            .collect();

        d.logs
            .append(job_id, LogLevel::Info, "enriching sections")
            .await;
        let ctx = enrich::EnrichContext {
            text: &*d.text,
            image: &*d.image,
            search: &*d.search,
            logs: &*d.logs,
            gen_gate: &d.gen_gate,
            search_gate: &d.search_gate,
            config: &self.config,
            job_id,
        };
        enrich::enrich_sections(&ctx, &outline, &mut sections).await;

        let any_uploaded = assets::upload_section_images(
            &*d.assets,
            &*d.publisher,
            &*d.logs,
            job_id,
            &mut sections,
        )
        .await;

        let doc = assemble(&outline.title, &body.meta, &sections, self.config.render_mode);

        d.logs
            .append(job_id, LogLevel::Info, "publishing document")
            .await;
        match d.publisher.publish(&doc).await {
            Ok(receipt) => {
                info!(job_id = %job_id, url = %receipt.url, "pipeline finished");
                d.logs
                    .append(
                        job_id,
                        LogLevel::Info,
                        &format!("published at {}", receipt.url),
                    )
                    .await;
                Ok(PipelineResult {
                    result_url: receipt.url,
                    result_msg: format!("published \"{}\"", doc.title),
                })
            }
            Err(e) => {
                if any_uploaded {
                    assets::compensate(&*d.assets, &*d.logs, job_id).await;
                }
                Err(e)
            }
        }
    }
}
