//! # Scribe
//!
//! HTTP server and CLI for the staged AI blog-writing demo. Navigation and
//! feature gating live in `scribe-core`; this crate adds sessions, the AI
//! service adapters and the HTTP surface.

pub mod api;
pub mod config;
pub mod openai;
pub mod session;
