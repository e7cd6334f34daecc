//! Collaborator trait seams.
//!
//! These are infrastructure traits only: no content policy lives here.
//! What to prompt for, how to rank candidates, and what goes into the
//! document is pipeline logic (`crate::pipeline`); these traits are the
//! narrow interfaces the pipeline consumes its external collaborators
//! through.

mod assets;
mod log;
mod publisher;
mod search;
mod text;

pub use assets::AssetStore;
pub use log::JobLogSink;
pub use publisher::PlatformPublisher;
pub use search::{SearchHit, SearchKind, WebSearch};
pub use text::{ImageGenerator, TextGenerator};
