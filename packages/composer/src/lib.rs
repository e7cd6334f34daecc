//! Multi-Stage Blog Content Composition Library
//!
//! Turns a `(title, brief)` pair into a published blog post through a
//! fixed pipeline: outline, body expansion, parallel per-section
//! enrichment, asset upload, assembly, publish.
//!
//! # Design Philosophy
//!
//! **"Degrade sections, fail jobs"**
//!
//! - Stage failures before the fan-out abort the run with no partial
//!   output
//! - Per-section enrichment failures degrade that one field and are
//!   logged against the owning job; they never cross section boundaries
//! - Quota-constrained collaborators sit behind shared admission gates
//!   with bounded concurrency, pacing, and jittered backoff
//! - A publish failure after uploads compensates by deleting everything
//!   under the job's asset prefix
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use composer::{ComposeConfig, ComposeDeps, ContentPipeline};
//! use composer::limiter::RetryExecutor;
//!
//! let deps = ComposeDeps {
//!     text: Arc::new(composer::clients::OpenAiText::new(api_key)),
//!     // ... image, search, assets, publisher, logs ...
//!     gen_gate: Arc::new(RetryExecutor::new("generation", 3, Duration::from_millis(500))),
//!     search_gate: Arc::new(RetryExecutor::new("search", 3, Duration::from_millis(250))),
//! };
//! let pipeline = ContentPipeline::new(deps, ComposeConfig::default());
//! let result = pipeline.run(job_id, &brief).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator seams (generation, search, assets,
//!   publishing, job logs)
//! - [`types`] - Pipeline data types
//! - [`pipeline`] - The staged pipeline itself
//! - [`clients`] - HTTP implementations of the collaborator traits
//! - [`limiter`] - Admission control and retry
//! - [`security`] - Credential handling
//! - [`testing`] - Scriptable mocks for tests

pub mod clients;
pub mod config;
pub mod error;
pub mod limiter;
pub mod pipeline;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

pub use config::{ComposeConfig, ImageStrategy};
pub use error::{ComposeError, Result};
pub use pipeline::{ComposeDeps, ContentPipeline};
pub use types::{Brief, LogLevel, PipelineResult, RenderMode};
