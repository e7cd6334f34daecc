//! Scriptable in-memory collaborators for tests.
//!
//! Each mock records the calls it receives and replays scripted
//! responses, so pipeline tests can assert on interaction order and
//! failure isolation without any network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{ComposeError, Result};
use crate::traits::{
    AssetStore, ImageGenerator, JobLogSink, PlatformPublisher, SearchHit, SearchKind,
    TextGenerator, WebSearch,
};
use crate::types::{AssembledDocument, LogLevel, PublishReceipt};

/// Text generator replaying scripted replies keyed by prompt substring.
/// The first matching pattern wins; an unmatched prompt is a generation
/// error, which keeps typos in test scripts loud.
#[derive(Default)]
pub struct MockTextGenerator {
    replies: Vec<(String, ScriptedReply)>,
    prompts: Mutex<Vec<String>>,
}

enum ScriptedReply {
    Reply(String),
    Failure(String),
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` whenever the prompt contains `pattern`.
    pub fn with_reply(mut self, pattern: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies
            .push((pattern.into(), ScriptedReply::Reply(reply.into())));
        self
    }

    /// Fail with `message` whenever the prompt contains `pattern`.
    pub fn fail_on(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.replies
            .push((pattern.into(), ScriptedReply::Failure(message.into())));
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        for (pattern, reply) in &self.replies {
            if prompt.contains(pattern.as_str()) {
                return match reply {
                    ScriptedReply::Reply(text) => Ok(text.clone()),
                    ScriptedReply::Failure(message) => {
                        Err(ComposeError::generation_msg(message.clone()))
                    }
                };
            }
        }
        Err(ComposeError::generation_msg(format!(
            "no scripted reply matches prompt: {prompt}"
        )))
    }
}

/// Image generator returning fixed bytes, optionally failing first.
#[derive(Default)]
pub struct MockImageGenerator {
    bytes: Vec<u8>,
    fail_times: AtomicU32,
    calls: AtomicU32,
}

impl MockImageGenerator {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Default::default()
        }
    }

    /// Fail the first `n` calls before succeeding.
    pub fn failing_first(self, n: u32) -> Self {
        self.fail_times.store(n, Ordering::SeqCst);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times.load(Ordering::SeqCst) {
            return Err(ComposeError::generation_msg("image backend unavailable"));
        }
        Ok(self.bytes.clone())
    }
}

/// Search collaborator replaying scripted hits keyed by query substring.
#[derive(Default)]
pub struct MockSearch {
    hits: Vec<(String, Vec<SearchHit>)>,
    failures: Vec<String>,
    queries: Mutex<Vec<(String, SearchKind)>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `hits` for any query containing `pattern`.
    pub fn with_hits(mut self, pattern: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        self.hits.push((pattern.into(), hits));
        self
    }

    /// Fail any query containing `pattern`.
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.failures.push(pattern.into());
        self
    }

    pub fn queries(&self) -> Vec<(String, SearchKind)> {
        self.queries.lock().unwrap().clone()
    }
}

/// Convenience constructor for a scripted hit.
pub fn hit(title: &str, url: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        url: url.to_string(),
        content: format!("about {title}"),
    }
}

#[async_trait]
impl WebSearch for MockSearch {
    async fn search(
        &self,
        query: &str,
        kind: SearchKind,
        max_results: usize,
    ) -> Result<Vec<SearchHit>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), kind));
        if self.failures.iter().any(|p| query.contains(p.as_str())) {
            return Err(ComposeError::search(crate::error::Message(format!(
                "scripted search failure for: {query}"
            ))));
        }
        for (pattern, hits) in &self.hits {
            if query.contains(pattern.as_str()) {
                return Ok(hits.iter().take(max_results).cloned().collect());
            }
        }
        Ok(Vec::new())
    }
}

/// Asset store recording uploads and prefix deletes in memory.
#[derive(Default)]
pub struct MockAssetStore {
    uploads: Mutex<Vec<String>>,
    deleted_prefixes: Mutex<Vec<String>>,
    fail_uploads: bool,
}

impl MockAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Default::default()
        }
    }

    /// Keys uploaded so far.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deleted_prefixes(&self) -> Vec<String> {
        self.deleted_prefixes.lock().unwrap().clone()
    }

    /// Keys still present: uploads not covered by a later prefix delete.
    pub fn remaining_keys(&self) -> Vec<String> {
        let deleted = self.deleted_prefixes.lock().unwrap();
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|key| !deleted.iter().any(|p| key.starts_with(p.as_str())))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AssetStore for MockAssetStore {
    async fn upload(&self, _bytes: &[u8], key: &str) -> Result<String> {
        if self.fail_uploads {
            return Err(ComposeError::asset_store(crate::error::Message(
                "scripted upload failure".to_string(),
            )));
        }
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(format!("https://assets.test/{key}"))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<()> {
        self.deleted_prefixes.lock().unwrap().push(prefix.to_string());
        Ok(())
    }
}

/// Publisher succeeding with a fixed URL, optionally failing first.
#[derive(Default)]
pub struct MockPublisher {
    url: String,
    fail_times: AtomicU32,
    calls: AtomicU32,
    published: Mutex<Vec<AssembledDocument>>,
}

impl MockPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Fail the first `n` publish calls before succeeding.
    pub fn failing_first(self, n: u32) -> Self {
        self.fail_times.store(n, Ordering::SeqCst);
        self
    }

    pub fn published(&self) -> Vec<AssembledDocument> {
        self.published.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformPublisher for MockPublisher {
    async fn publish(&self, doc: &AssembledDocument) -> Result<PublishReceipt> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times.load(Ordering::SeqCst) {
            return Err(ComposeError::publish_msg("scripted publish failure"));
        }
        self.published.lock().unwrap().push(doc.clone());
        Ok(PublishReceipt {
            url: self.url.clone(),
        })
    }
}

/// Log sink recording every appended line.
#[derive(Default)]
pub struct MockLogSink {
    lines: Mutex<Vec<(Uuid, LogLevel, String)>>,
}

impl MockLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Uuid, LogLevel, String)> {
        self.lines.lock().unwrap().clone()
    }

    /// Recorded messages at the given level.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, l, _)| *l == level)
            .map(|(_, _, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl JobLogSink for MockLogSink {
    async fn append(&self, job_id: Uuid, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((job_id, level, message.to_string()));
    }
}
