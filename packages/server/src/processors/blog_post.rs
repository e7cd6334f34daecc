//! Processor that runs the composition pipeline for one blog job.

use anyhow::{Context, Result};
use async_trait::async_trait;
use composer::types::Brief;
use composer::ContentPipeline;
use serde::Deserialize;

use crate::kernel::jobs::{Job, JobProcessor};

/// Job payload for blog jobs. The post title is the job's subject; the
/// brief defaults to the job's description when the payload omits it.
#[derive(Debug, Default, Deserialize)]
pub struct BlogPostPayload {
    #[serde(default)]
    pub brief: Option<String>,
}

/// One instance per publishing target: the pipeline inside carries that
/// target's publisher and render mode.
pub struct BlogPostProcessor {
    pipeline: ContentPipeline,
}

impl BlogPostProcessor {
    pub fn new(pipeline: ContentPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl JobProcessor for BlogPostProcessor {
    async fn process(&self, job: &Job) -> Result<String> {
        let payload: BlogPostPayload =
            serde_json::from_value(job.payload.clone()).context("invalid blog job payload")?;

        let brief = Brief {
            title: job.subject.clone(),
            brief: payload.brief.unwrap_or_else(|| job.description.clone()),
        };

        let result = self.pipeline.run(job.id, &brief).await?;
        Ok(result.result_msg)
    }
}
