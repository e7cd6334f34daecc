//! Pressline server core: durable job queue, scheduler, processors,
//! and the operator REST surface.
//!
//! The composition pipeline itself lives in the `composer` crate; this
//! crate owns job lifecycle and dispatch.

pub mod config;
pub mod kernel;
pub mod processors;
pub mod server;

pub use config::Config;
