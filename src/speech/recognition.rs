//! Speech-recognition client: WAV audio in, transcript out.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::summarization::model_endpoint;

/// Errors raised when the recognition service cannot be consulted.
///
/// Audio the service cannot interpret is not an error; see [`Recognition::NotUnderstood`].
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The service could not be reached.
    #[error("Could not request results from speech recognition service; {0}")]
    Request(String),
    /// The service answered with an error.
    #[error("Could not request results from speech recognition service; {0}")]
    Service(String),
}

/// Outcome of a recognition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    /// Text recognized in the audio.
    Transcript(String),
    /// The service could not interpret any speech.
    NotUnderstood,
}

impl Recognition {
    /// Classify raw recognizer output; blank text means nothing was understood.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Self::NotUnderstood
        } else {
            Self::Transcript(trimmed.to_string())
        }
    }
}

/// Interface implemented by speech-recognition providers.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe a complete WAV recording.
    async fn recognize(&self, wav: Vec<u8>) -> Result<Recognition, RecognitionError>;
}

/// Recognizer backed by a hosted Hugging Face inference endpoint.
pub struct HuggingFaceRecognizer {
    http: Client,
    endpoint: String,
    token: Option<String>,
}

impl HuggingFaceRecognizer {
    /// Build a recognizer for `{base_url}/{model}`.
    pub fn new(
        base_url: &str,
        model: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RecognitionError> {
        let http = Client::builder()
            .user_agent("text-summarizer/speech")
            .timeout(timeout)
            .build()
            .map_err(|error| RecognitionError::Request(format!("{error}")))?;
        Ok(Self {
            http,
            endpoint: model_endpoint(base_url, model),
            token,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AsrResponse {
    Text { text: String },
    Error { error: String },
}

#[async_trait]
impl SpeechRecognizer for HuggingFaceRecognizer {
    async fn recognize(&self, wav: Vec<u8>) -> Result<Recognition, RecognitionError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| RecognitionError::Request(error.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| RecognitionError::Request(error.to_string()))?;

        match serde_json::from_str::<AsrResponse>(&body) {
            Ok(AsrResponse::Text { text }) if status.is_success() => {
                Ok(Recognition::from_text(&text))
            }
            Ok(AsrResponse::Error { error }) => {
                Err(RecognitionError::Service(format!("{status}: {error}")))
            }
            _ if !status.is_success() => {
                Err(RecognitionError::Service(format!("{status}: {body}")))
            }
            _ => Err(RecognitionError::Service(format!(
                "unexpected response body: {body}"
            ))),
        }
    }
}
