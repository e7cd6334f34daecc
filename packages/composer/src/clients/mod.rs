//! HTTP implementations of the collaborator traits.
//!
//! One module per external service. All clients share a
//! `reqwest::Client` internally and keep credentials in
//! [`crate::security::SecretString`].

mod asset_store;
mod openai;
pub mod publishers;
mod tavily;

pub use asset_store::HttpAssetStore;
pub use openai::{OpenAiImage, OpenAiText};
pub use tavily::TavilySearch;
