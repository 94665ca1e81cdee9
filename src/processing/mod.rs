//! Document processing pipeline: extraction, cleaning, chunking, and summary composition.

pub mod chunking;
pub mod extract;
pub mod sanitize;
mod service;
pub mod summarize;
pub mod types;

pub use service::{ProcessingApi, ProcessingService};
pub use summarize::{CompositionPolicy, compose_summary};
pub use types::{
    Action, ChunkingError, ComposedSummary, DocumentOutcome, ExtractionError, ProcessingError,
    TranscriptionOutcome,
};
