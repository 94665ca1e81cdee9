//! HTTP surface for the text summarizer.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /api/process` – Extract text from an uploaded document (`file` part) and summarize
//!   it. The optional `action` is read from the form or the query string and defaults to
//!   `summarize`. Responds with `{ success, result, type, message }`.
//! - `POST /api/speech-to-text` – Transcribe an uploaded recording (`audio_file` part) and
//!   summarize the transcript. Responds with
//!   `{ success, transcribed_text, summary, overall_summary, message }`.
//! - `POST /api/text-to-speech` – Synthesize `{ "text", "voice_type"? }` and stream the MP3
//!   back as `speech.mp3`.
//! - `GET /healthcheck` – Liveness probe.
//! - `GET /metrics` – Request counters.
//!
//! Pipeline failures are reported in the JSON envelope with `success: false`; only missing
//! inputs and synthesis failures change the status code.

use crate::metrics::MetricsSnapshot;
use crate::processing::{Action, DocumentOutcome, ProcessingApi, TranscriptionOutcome};
use crate::speech::VoiceType;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

const DOCUMENT_FIELD: &str = "file";
const AUDIO_FIELD: &str = "audio_file";
const ACTION_FIELD: &str = "action";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

const DOCUMENT_SUCCESS: &str = "Document summarized successfully";
const AUDIO_SUCCESS: &str = "Audio processed successfully";
const AUDIO_NOT_UNDERSTOOD: &str =
    "Could not understand the audio. Please try again with clearer audio.";
const NO_TEXT: &str = "No text provided.";

/// Router-level settings supplied by the binary.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_origins: Vec<String>,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
}

/// Build the HTTP router exposing the summarizer API surface.
pub fn create_router<S>(service: Arc<S>, settings: &ApiSettings) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/api/process", post(process_document::<S>))
        .route("/api/speech-to-text", post(speech_to_text::<S>))
        .route("/api/text-to-speech", post(text_to_speech::<S>))
        .route("/healthcheck", get(healthcheck))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(origin = %origin, error = %error, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// A file part pulled out of a multipart form.
struct UploadedFile {
    filename: Option<String>,
    content_type: String,
    bytes: Vec<u8>,
}

/// The parts of a multipart form this API understands.
#[derive(Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    action: Option<String>,
}

/// Collect the file part named `file_field` and the `action` text part.
async fn read_upload(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(name) if name == file_field => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or(FALLBACK_CONTENT_TYPE)
                    .to_string();
                let bytes = field.bytes().await?.to_vec();
                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            Some(ACTION_FIELD) => form.action = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(form)
}

/// Response body for `POST /api/process`.
#[derive(Debug, Serialize)]
struct ProcessResponse {
    success: bool,
    result: Option<String>,
    #[serde(rename = "type")]
    kind: Option<&'static str>,
    message: String,
}

impl ProcessResponse {
    fn summary(result: String) -> Self {
        Self {
            success: true,
            result: Some(result),
            kind: Some("summary"),
            message: DOCUMENT_SUCCESS.into(),
        }
    }

    fn failure(message: String) -> Self {
        Self {
            success: false,
            result: None,
            kind: None,
            message,
        }
    }
}

/// Query parameters accepted by `POST /api/process`.
#[derive(Debug, Default, Deserialize)]
struct ProcessQuery {
    #[serde(default)]
    action: Option<String>,
}

/// Extract and summarize an uploaded document.
async fn process_document<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<ProcessQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<ProcessResponse>)
where
    S: ProcessingApi,
{
    let form = match multipart {
        Ok(multipart) => read_upload(multipart, DOCUMENT_FIELD)
            .await
            .map_err(|error| error.to_string()),
        Err(rejection) => Err(rejection.to_string()),
    };
    let form = match form {
        Ok(form) => form,
        Err(error) => {
            tracing::warn!(error = %error, "Rejected document upload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ProcessResponse::failure(format!(
                    "Error processing document: {error}"
                ))),
            );
        }
    };
    let Some(file) = form.file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ProcessResponse::failure(
                "Error processing document: no file uploaded".into(),
            )),
        );
    };

    let action = Action::parse(form.action.as_deref().or(query.action.as_deref()));
    let response = match service
        .process_document(file.bytes, &file.content_type, action)
        .await
    {
        Ok(DocumentOutcome::Summarized(summary)) => ProcessResponse::summary(summary.overall),
        Ok(DocumentOutcome::UnsupportedAction(action)) => {
            ProcessResponse::failure(format!("Unsupported action: {action}"))
        }
        Err(error) => {
            tracing::error!(error = %error, "Document processing failed");
            ProcessResponse::failure(format!("Error processing document: {error}"))
        }
    };
    (StatusCode::OK, Json(response))
}

/// Response body for `POST /api/speech-to-text`.
#[derive(Debug, Serialize)]
struct SpeechToTextResponse {
    success: bool,
    transcribed_text: Option<String>,
    summary: Option<String>,
    overall_summary: Option<String>,
    message: String,
}

impl SpeechToTextResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            transcribed_text: None,
            summary: None,
            overall_summary: None,
            message,
        }
    }
}

/// Transcribe and summarize an uploaded recording.
async fn speech_to_text<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<SpeechToTextResponse>)
where
    S: ProcessingApi,
{
    let form = match multipart {
        Ok(multipart) => read_upload(multipart, AUDIO_FIELD)
            .await
            .map_err(|error| error.to_string()),
        Err(rejection) => Err(rejection.to_string()),
    };
    let file = match form {
        Ok(UploadForm {
            file: Some(file), ..
        }) => file,
        Ok(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SpeechToTextResponse::failure(
                    "Error processing audio: no audio file uploaded".into(),
                )),
            );
        }
        Err(error) => {
            tracing::warn!(error = %error, "Rejected audio upload");
            return (
                StatusCode::BAD_REQUEST,
                Json(SpeechToTextResponse::failure(format!(
                    "Error processing audio: {error}"
                ))),
            );
        }
    };

    let filename = file.filename.unwrap_or_default();
    let response = match service.transcribe_audio(&filename, file.bytes).await {
        Ok(TranscriptionOutcome::Transcribed { text, summary }) => SpeechToTextResponse {
            success: true,
            transcribed_text: Some(text),
            summary: Some(summary.detailed),
            overall_summary: Some(summary.overall),
            message: AUDIO_SUCCESS.into(),
        },
        Ok(TranscriptionOutcome::NotUnderstood) => {
            SpeechToTextResponse::failure(AUDIO_NOT_UNDERSTOOD.into())
        }
        Err(error) => {
            tracing::error!(error = %error, "Audio processing failed");
            SpeechToTextResponse::failure(format!("Error processing audio: {error}"))
        }
    };
    (StatusCode::OK, Json(response))
}

/// Request body for `POST /api/text-to-speech`.
#[derive(Debug, Deserialize)]
struct TextToSpeechRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    voice_type: Option<String>,
}

/// JSON error body for `POST /api/text-to-speech`.
#[derive(Debug, Serialize)]
struct TextToSpeechError {
    success: bool,
    message: String,
}

fn tts_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(TextToSpeechError {
            success: false,
            message,
        }),
    )
        .into_response()
}

/// Synthesize speech and return it as an MP3 attachment.
///
/// The body is parsed by hand so malformed JSON gets the same 400 as a missing `text`.
async fn text_to_speech<S>(State(service): State<Arc<S>>, body: Bytes) -> Response
where
    S: ProcessingApi,
{
    let request = serde_json::from_slice::<TextToSpeechRequest>(&body).ok();
    let Some((text, voice_type)) = request
        .and_then(|request| request.text.map(|text| (text, request.voice_type)))
        .filter(|(text, _)| !text.trim().is_empty())
    else {
        return tts_error(StatusCode::BAD_REQUEST, NO_TEXT.into());
    };

    let voice = VoiceType::parse(voice_type.as_deref());
    let audio = match service.synthesize_speech(&text, voice).await {
        Ok(audio) => audio,
        Err(error) => {
            tracing::error!(error = %error, "Speech synthesis failed");
            return tts_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {error}"));
        }
    };
    let bytes = match audio.read().await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(error = %error, "Failed to read synthesized audio");
            return tts_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {error}"));
        }
    };
    drop(audio);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"speech.mp3\""),
        ],
        bytes,
    )
        .into_response()
}

/// Response body for `GET /healthcheck`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Return the request counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}
