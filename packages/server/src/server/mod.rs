//! HTTP server: wiring, routes, error mapping.

pub mod app;
pub mod error;
pub mod routes;

pub use app::{build_app, build_state, AppState};
