//! Topic discovery: generate future post ideas and enqueue them.
//!
//! The generative call proposes topics for a theme; each becomes a new
//! blog job with a staggered scheduled time, so a single discovery run
//! fills the queue for days without piling everything onto one tick.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use composer::limiter::RetryExecutor;
use composer::traits::TextGenerator;
use serde::Deserialize;
use tracing::info;

use crate::kernel::jobs::{Job, JobProcessor, JobStore, JobTargetType, NewJob};

#[derive(Debug, Deserialize)]
pub struct TopicDiscoveryPayload {
    /// Theme the proposed topics should fit.
    pub theme: String,
    /// Which blog platform the created jobs publish to.
    pub platform: JobTargetType,
    #[serde(default = "default_count")]
    pub count: usize,
    /// Hours between consecutive scheduled posts.
    #[serde(default = "default_interval_hours")]
    pub interval_hours: i64,
}

fn default_count() -> usize {
    5
}

fn default_interval_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
struct TopicList {
    topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
struct Topic {
    title: String,
    angle: String,
}

pub struct TopicDiscoveryProcessor {
    text: Arc<dyn TextGenerator>,
    gate: Arc<RetryExecutor>,
    store: Arc<dyn JobStore>,
}

impl TopicDiscoveryProcessor {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        gate: Arc<RetryExecutor>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self { text, gate, store }
    }

    fn prompt(payload: &TopicDiscoveryPayload) -> String {
        format!(
            "Propose {count} blog post topics about: {theme}\n\
             Each topic needs a concrete title and a one-sentence angle.\n\
             Reply with JSON only: {{\"topics\": [{{\"title\": \"...\", \"angle\": \"...\"}}]}}",
            count = payload.count,
            theme = payload.theme,
        )
    }
}

#[async_trait]
impl JobProcessor for TopicDiscoveryProcessor {
    async fn process(&self, job: &Job) -> Result<String> {
        let payload: TopicDiscoveryPayload =
            serde_json::from_value(job.payload.clone()).context("invalid topic job payload")?;

        if payload.platform == JobTargetType::TopicDiscovery {
            bail!("topic discovery cannot target itself");
        }

        let prompt = Self::prompt(&payload);
        let value = self
            .gate
            .run(|| self.text.generate_json(&prompt))
            .await
            .context("topic generation failed")?;
        let list: TopicList =
            serde_json::from_value(value).context("malformed topic list from model")?;

        if list.topics.is_empty() {
            bail!("topic generation returned no topics");
        }

        let mut scheduled = Utc::now();
        for topic in &list.topics {
            scheduled += Duration::hours(payload.interval_hours);
            let created = self
                .store
                .enqueue(NewJob {
                    target_type: payload.platform,
                    subject: topic.title.clone(),
                    description: topic.angle.clone(),
                    priority: 0,
                    payload: serde_json::json!({}),
                    scheduled_at: Some(scheduled),
                })
                .await?;
            info!(job_id = %created.id, subject = %topic.title, "scheduled discovered topic");
        }

        Ok(format!("scheduled {} topics", list.topics.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::testing::MemoryJobStore;
    use crate::kernel::jobs::JobStatus;
    use composer::limiter::RetryPolicy;
    use composer::testing::MockTextGenerator;
    use std::time::Duration as StdDuration;

    fn gate() -> Arc<RetryExecutor> {
        Arc::new(RetryExecutor::with_policy(
            "topics",
            1,
            StdDuration::from_millis(1),
            RetryPolicy {
                max_attempts: 2,
                base: StdDuration::from_millis(1),
                cap: StdDuration::from_millis(5),
            },
        ))
    }

    fn discovery_job(store_payload: serde_json::Value) -> Job {
        Job {
            id: uuid::Uuid::new_v4(),
            target_type: JobTargetType::TopicDiscovery,
            status: JobStatus::Processing,
            priority: 0,
            subject: "weekly topics".into(),
            description: String::new(),
            payload: store_payload,
            scheduled_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result_msg: None,
            error_msg: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn discovered_topics_become_staggered_jobs() {
        let text = Arc::new(MockTextGenerator::new().with_reply(
            "blog post topics",
            r#"{"topics":[
                {"title":"Basil from seed","angle":"germination"},
                {"title":"Basil pests","angle":"aphids"}
            ]}"#,
        ));
        let store = Arc::new(MemoryJobStore::new());
        let processor = TopicDiscoveryProcessor::new(text, gate(), store.clone());

        let job = discovery_job(serde_json::json!({
            "theme": "indoor basil",
            "platform": "rest_blog",
            "count": 2,
            "interval_hours": 24
        }));
        let msg = processor.process(&job).await.unwrap();
        assert_eq!(msg, "scheduled 2 topics");

        let mut jobs = store.all_jobs();
        jobs.sort_by_key(|j| j.scheduled_at);
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.target_type == JobTargetType::RestBlog));
        assert!(jobs[1].scheduled_at - jobs[0].scheduled_at >= Duration::hours(23));
    }

    #[tokio::test]
    async fn self_targeting_payload_is_rejected() {
        let text = Arc::new(MockTextGenerator::new());
        let store = Arc::new(MemoryJobStore::new());
        let processor = TopicDiscoveryProcessor::new(text, gate(), store);

        let job = discovery_job(serde_json::json!({
            "theme": "anything",
            "platform": "topic_discovery"
        }));
        assert!(processor.process(&job).await.is_err());
    }
}
