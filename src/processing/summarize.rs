//! Chunk, summarize, and recombine long text into one bounded summary.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. Clean the text. Inputs under [`CompositionPolicy::min_words`] words are returned as-is.
//! 2. Chunk the cleaned text into sentence-aligned windows of at most
//!    [`CompositionPolicy::chunk_chars`] characters.
//! 3. Summarize every chunk whose trimmed length exceeds
//!    [`CompositionPolicy::min_chunk_chars`]. A failed call degrades to the chunk's first
//!    characters plus an ellipsis instead of failing the request.
//! 4. Join the chunk summaries with single spaces. If the result still has more than
//!    [`CompositionPolicy::condense_above_words`] words, summarize it once more; on failure the
//!    combined text is truncated instead.
//!
//! Chunk calls may overlap when `concurrency > 1`, but results are always reassembled in chunk
//! order.

use futures_util::stream::{self, StreamExt};

use crate::summarization::{SummarizationClient, SummarizationRequest, SummaryParams};

use super::{
    chunking::chunk_sentences,
    sanitize::{clean_text, word_count},
    types::{ChunkingError, ComposedSummary},
};

/// Marker appended to truncated fallback text.
pub const ELLIPSIS: &str = "...";

/// Thresholds and summarizer parameters steering [`compose_summary`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPolicy {
    /// Texts with fewer words are returned cleaned but unsummarized.
    pub min_words: usize,
    /// Character budget per chunk.
    pub chunk_chars: usize,
    /// Chunks whose trimmed length is at or below this are skipped.
    pub min_chunk_chars: usize,
    /// Provider parameters for chunk summaries.
    pub chunk_params: SummaryParams,
    /// Characters kept from a chunk whose summary failed.
    pub chunk_fallback_chars: usize,
    /// Combined summaries with more words than this are condensed again.
    pub condense_above_words: usize,
    /// Provider parameters for the condensation pass.
    pub condense_params: SummaryParams,
    /// Characters kept from the combined summary when condensation fails.
    pub condense_fallback_chars: usize,
    /// Maximum number of chunk summaries in flight.
    pub concurrency: usize,
}

impl Default for CompositionPolicy {
    fn default() -> Self {
        Self {
            min_words: 50,
            chunk_chars: 1024,
            min_chunk_chars: 100,
            chunk_params: SummaryParams::chunk(),
            chunk_fallback_chars: 200,
            condense_above_words: 300,
            condense_params: SummaryParams::condense(),
            condense_fallback_chars: 500,
            concurrency: 1,
        }
    }
}

impl CompositionPolicy {
    /// Override the number of chunk summaries requested concurrently.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Produce the composed summary for raw extracted text.
pub async fn compose_summary(
    text: &str,
    client: &dyn SummarizationClient,
    policy: &CompositionPolicy,
) -> Result<ComposedSummary, ChunkingError> {
    let cleaned = clean_text(text);
    let words = word_count(&cleaned);
    if words < policy.min_words {
        tracing::debug!(words, "Text too short to summarize; returning cleaned text");
        return Ok(ComposedSummary {
            detailed: cleaned.clone(),
            overall: cleaned,
            chunk_count: 0,
            summarized_chunks: 0,
            fallbacks: 0,
            condensed: false,
        });
    }

    let chunks = chunk_sentences(&cleaned, policy.chunk_chars)?;
    let chunk_count = chunks.len();
    let substantial: Vec<(usize, String)> = chunks
        .into_iter()
        .enumerate()
        .filter(|(_, chunk)| chunk.trim().chars().count() > policy.min_chunk_chars)
        .collect();
    let summarized_chunks = substantial.len();
    tracing::debug!(
        words,
        chunk_count,
        summarized_chunks,
        concurrency = policy.concurrency,
        "Summarizing chunks"
    );

    let results: Vec<(String, bool)> = stream::iter(substantial)
        .map(|(index, chunk)| summarize_chunk(client, policy, index, chunk))
        .buffered(policy.concurrency.max(1))
        .collect()
        .await;

    let mut fallbacks = results.iter().filter(|(_, degraded)| *degraded).count();
    let detailed = results
        .into_iter()
        .map(|(summary, _)| summary)
        .collect::<Vec<_>>()
        .join(" ");

    let combined_words = word_count(&detailed);
    if combined_words <= policy.condense_above_words {
        return Ok(ComposedSummary {
            overall: detailed.clone(),
            detailed,
            chunk_count,
            summarized_chunks,
            fallbacks,
            condensed: false,
        });
    }

    tracing::debug!(combined_words, "Condensing combined summary");
    let request = SummarizationRequest {
        text: detailed.clone(),
        params: policy.condense_params,
    };
    let overall = match client.summarize(request).await {
        Ok(summary) => summary,
        Err(error) => {
            tracing::warn!(error = %error, "Condensation failed; truncating combined summary");
            fallbacks += 1;
            truncate_with_ellipsis(&detailed, policy.condense_fallback_chars)
        }
    };

    Ok(ComposedSummary {
        detailed,
        overall,
        chunk_count,
        summarized_chunks,
        fallbacks,
        condensed: true,
    })
}

/// Summarize one chunk, degrading to truncated text on summarizer failure.
///
/// The flag is `true` when the fallback was used.
async fn summarize_chunk(
    client: &dyn SummarizationClient,
    policy: &CompositionPolicy,
    index: usize,
    chunk: String,
) -> (String, bool) {
    let request = SummarizationRequest {
        text: chunk.clone(),
        params: policy.chunk_params,
    };
    match client.summarize(request).await {
        Ok(summary) => (summary, false),
        Err(error) => {
            tracing::warn!(chunk = index, error = %error, "Chunk summary failed; using excerpt");
            (truncate_with_ellipsis(&chunk, policy.chunk_fallback_chars), true)
        }
    }
}

/// First `max_chars` characters of `text` followed by [`ELLIPSIS`].
pub(crate) fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
