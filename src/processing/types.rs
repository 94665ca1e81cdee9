//! Core data types and error definitions for the processing pipeline.

use crate::speech::{SynthesisError, TranscriptionError};
use thiserror::Error;

/// Errors produced while turning cleaned text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors raised while pulling text out of an uploaded document.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Plain-text upload was not valid UTF-8.
    #[error("text file is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// PDF could not be parsed.
    #[error("failed to parse PDF: {0}")]
    Pdf(String),
    /// DOCX archive or its XML could not be read.
    #[error("failed to parse DOCX: {0}")]
    Docx(String),
    /// A blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Errors emitted by the processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Document text could not be extracted.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
    /// Chunking step failed to segment the text.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Audio could not be transcribed.
    #[error("{0}")]
    Transcription(#[from] TranscriptionError),
    /// Speech synthesis failed.
    #[error("{0}")]
    Synthesis(#[from] SynthesisError),
}

/// Operation requested from `POST /api/process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Summarize the extracted text.
    Summarize,
    /// Any action the service does not implement, kept verbatim for reporting.
    Unsupported(String),
}

impl Action {
    /// Parse the `action` form value. Only an absent value defaults to [`Action::Summarize`];
    /// any value other than exactly `summarize` is unsupported.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("summarize") => Self::Summarize,
            Some(other) => Self::Unsupported(other.to_string()),
        }
    }
}

/// Result of a composed summary, see [`crate::processing::summarize::compose_summary`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedSummary {
    /// Per-chunk summaries joined with single spaces (or the cleaned text when too short).
    pub detailed: String,
    /// Final summary: the condensed second pass when it ran, otherwise `detailed`.
    pub overall: String,
    /// Number of chunks the cleaned text was split into.
    pub chunk_count: usize,
    /// Number of chunks that carried enough content to be sent to the summarization provider.
    pub summarized_chunks: usize,
    /// Number of chunk or condensation calls that degraded to truncated text.
    pub fallbacks: usize,
    /// Whether the second-pass condensation was attempted.
    pub condensed: bool,
}

/// Outcome of `POST /api/process`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// Document was summarized.
    Summarized(ComposedSummary),
    /// The requested action is not implemented.
    UnsupportedAction(String),
}

/// Outcome of `POST /api/speech-to-text`.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionOutcome {
    /// Speech was recognized and summarized.
    Transcribed {
        /// Verbatim transcript returned by the recognizer.
        text: String,
        /// Summary composed from the transcript.
        summary: ComposedSummary,
    },
    /// The recognizer could not interpret the audio.
    NotUnderstood,
}
