//! Sentence-aligned chunking for the summarization provider.
//!
//! Cleaned text is split into sentences after terminal punctuation (`.`, `!`, `?`) followed by
//! whitespace, then packed greedily into chunks whose character count stays within a budget:
//!
//! - A sentence is appended while `len(current) + len(sentence) <= max_length`, where
//!   `current` carries a trailing separator space.
//! - When the next sentence would overflow and the current chunk has content, the chunk is
//!   flushed and the overflowing sentence starts the next one.
//! - A sentence longer than the budget is never split; it becomes a chunk of its own.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use regex::Regex;
use std::sync::OnceLock;

use super::types::ChunkingError;

fn sentence_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence boundary pattern"))
}

/// Split text into sentences, keeping terminal punctuation attached.
///
/// The whitespace separating sentences is consumed; empty fragments are discarded.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in sentence_boundary().find_iter(text) {
        // The punctuation mark is a single ASCII byte.
        let end = boundary.start() + 1;
        push_sentence(&mut sentences, &text[start..end]);
        start = boundary.end();
    }
    push_sentence(&mut sentences, &text[start..]);
    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, fragment: &'a str) {
    if !fragment.trim().is_empty() {
        sentences.push(fragment);
    }
}

/// Pack sentences into chunks of at most `max_length` characters.
///
/// Returns an empty vector when the text holds no sentences.
pub fn chunk_sentences(text: &str, max_length: usize) -> Result<Vec<String>, ChunkingError> {
    if max_length == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len <= max_length {
            current.push_str(sentence);
            current.push(' ');
            current_len += sentence_len + 1;
            continue;
        }

        if !current.is_empty() {
            flush(&mut chunks, &current);
        }
        current.clear();
        current.push_str(sentence);
        current.push(' ');
        current_len = sentence_len + 1;
    }

    if !current.is_empty() {
        flush(&mut chunks, &current);
    }

    tracing::trace!(chunks = chunks.len(), max_length, "Chunked text");
    Ok(chunks)
}

fn flush(chunks: &mut Vec<String>, current: &str) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
