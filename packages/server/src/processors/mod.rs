//! Job processors: one handler per job target type.

mod blog_post;
mod topic;

pub use blog_post::{BlogPostPayload, BlogPostProcessor};
pub use topic::{TopicDiscoveryPayload, TopicDiscoveryProcessor};
