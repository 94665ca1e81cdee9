use std::sync::atomic::{AtomicU64, Ordering};

use crate::processing::ComposedSummary;

/// Thread-safe counters describing request activity since startup.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_processed: AtomicU64,
    chunks_summarized: AtomicU64,
    chunk_fallbacks: AtomicU64,
    condensations: AtomicU64,
    transcriptions: AtomicU64,
    syntheses: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully summarized document.
    pub fn record_document(&self, summary: &ComposedSummary) {
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.record_summary(summary);
    }

    /// Record a successful transcription and the summary built from it.
    pub fn record_transcription(&self, summary: &ComposedSummary) {
        self.transcriptions.fetch_add(1, Ordering::Relaxed);
        self.record_summary(summary);
    }

    /// Record a synthesized audio file.
    pub fn record_synthesis(&self) {
        self.syntheses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_summary(&self, summary: &ComposedSummary) {
        self.chunks_summarized
            .fetch_add(summary.summarized_chunks as u64, Ordering::Relaxed);
        self.chunk_fallbacks
            .fetch_add(summary.fallbacks as u64, Ordering::Relaxed);
        if summary.condensed {
            self.condensations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            chunks_summarized: self.chunks_summarized.load(Ordering::Relaxed),
            chunk_fallbacks: self.chunk_fallbacks.load(Ordering::Relaxed),
            condensations: self.condensations.load(Ordering::Relaxed),
            transcriptions: self.transcriptions.load(Ordering::Relaxed),
            syntheses: self.syntheses.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters, served by `GET /metrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents summarized through `/api/process`.
    pub documents_processed: u64,
    /// Chunks sent to the summarization provider.
    pub chunks_summarized: u64,
    /// Provider calls that degraded to truncated text.
    pub chunk_fallbacks: u64,
    /// Second-pass condensations attempted.
    pub condensations: u64,
    /// Audio uploads transcribed successfully.
    pub transcriptions: u64,
    /// Audio files synthesized.
    pub syntheses: u64,
}
