//! Abstractions over the sequence-to-sequence summarization provider.
//!
//! The processing layer treats the model as a black box: text goes in with length and beam
//! controls, a summary comes out. The hosted adapter talks to a Hugging Face style inference
//! endpoint over HTTP; the handle is built once at startup and shared across requests.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while attempting abstractive summarization.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Provider was unreachable or still loading the model.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Generation controls forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryParams {
    /// Upper bound on generated tokens.
    pub max_length: u32,
    /// Lower bound on generated tokens.
    pub min_length: u32,
    /// Beam search width.
    pub num_beams: u32,
    /// Exponential length penalty; values above 1 favour longer output.
    pub length_penalty: f32,
    /// Stop each beam once it produced an end-of-sequence token.
    pub early_stopping: bool,
    /// Forbid repeating n-grams of this size.
    pub no_repeat_ngram_size: u32,
    /// Greedy/beam decoding only.
    pub do_sample: bool,
}

impl SummaryParams {
    /// Parameters used for each chunk of a document.
    pub const fn chunk() -> Self {
        Self::with_lengths(200, 50)
    }

    /// Parameters used to condense the combined chunk summaries.
    pub const fn condense() -> Self {
        Self::with_lengths(250, 100)
    }

    const fn with_lengths(max_length: u32, min_length: u32) -> Self {
        Self {
            max_length,
            min_length,
            num_beams: 4,
            length_penalty: 2.0,
            early_stopping: true,
            no_repeat_ngram_size: 3,
            do_sample: false,
        }
    }
}

/// Request payload passed to the summarization provider.
#[derive(Debug, Clone)]
pub struct SummarizationRequest {
    /// Text to summarize.
    pub text: String,
    /// Generation controls.
    pub params: SummaryParams,
}

/// Interface implemented by summarization providers.
///
/// Implementations must tolerate concurrent calls through a shared reference.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Summarize the supplied text.
    async fn summarize(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Summarizer backed by a hosted Hugging Face inference endpoint.
pub struct HuggingFaceSummarizer {
    http: Client,
    endpoint: String,
    token: Option<String>,
}

impl HuggingFaceSummarizer {
    /// Build a client for `{base_url}/{model}`.
    pub fn new(
        base_url: &str,
        model: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SummarizationClientError> {
        let http = Client::builder()
            .user_agent("text-summarizer/summary")
            .timeout(timeout)
            .build()
            .map_err(|error| {
                SummarizationClientError::ProviderUnavailable(format!(
                    "failed to build HTTP client: {error}"
                ))
            })?;
        Ok(Self {
            http,
            endpoint: model_endpoint(base_url, model),
            token,
        })
    }
}

pub(crate) fn model_endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        model.trim_start_matches('/')
    )
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Summaries(Vec<SummaryItem>),
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct SummaryItem {
    summary_text: String,
}

#[async_trait]
impl SummarizationClient for HuggingFaceSummarizer {
    async fn summarize(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let payload = json!({
            "inputs": request.text,
            "parameters": request.params,
            "options": { "wait_for_model": true },
        });

        let mut builder = self.http.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|error| {
            SummarizationClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.endpoint
            ))
        })?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "{} returned {status}: {body}",
                self.endpoint
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: InferenceResponse = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode summarization response: {error}"
            ))
        })?;

        match body {
            InferenceResponse::Error { error } => {
                Err(SummarizationClientError::GenerationFailed(error))
            }
            InferenceResponse::Summaries(items) => items
                .into_iter()
                .next()
                .map(|item| item.summary_text.trim().to_string())
                .ok_or_else(|| {
                    SummarizationClientError::InvalidResponse("empty summary list".into())
                }),
        }
    }
}
