//! Processor registry: maps a job's target type to its handler.
//!
//! Resolved once at startup into a static map keyed by the closed
//! [`JobTargetType`] enum; a job whose type has no registration is a
//! configuration error, not a transient failure.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::job::{Job, JobTargetType};

/// Handler for one job type. Receives the full job row; the payload
/// field is the processor's to interpret.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Execute the job, returning the operator-visible result message.
    async fn process(&self, job: &Job) -> Result<String>;
}

#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<JobTargetType, Arc<dyn JobProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the processor for a target type, replacing any previous
    /// registration.
    pub fn register(&mut self, target_type: JobTargetType, processor: Arc<dyn JobProcessor>) {
        self.processors.insert(target_type, processor);
    }

    pub fn get(&self, target_type: JobTargetType) -> Option<Arc<dyn JobProcessor>> {
        self.processors.get(&target_type).cloned()
    }
}
