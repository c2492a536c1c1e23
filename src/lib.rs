//! yt-audio - extract the best audio track from a video URL over HTTP
//!
//! The binary in `main.rs` wires configuration, tracing and the server; the
//! library exposes the router so it can be driven directly in tests.

pub mod api;
pub mod app;
pub mod config;
pub mod services;

pub use app::{AppState, build_app};
pub use config::Config;
