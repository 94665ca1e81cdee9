#![deny(missing_docs)]

//! Core library for the text summarizer service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Request counters.
pub mod metrics;
/// Document extraction and summary composition.
pub mod processing;
/// Speech recognition and synthesis.
pub mod speech;
/// Summarization provider abstraction and adapters.
pub mod summarization;
