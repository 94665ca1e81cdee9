//! Upload-to-transcript pipeline.
//!
//! An upload is persisted under the configured temp directory, normalized to WAV when its name
//! does not already end in `.wav`, calibrated, recorded in full and handed to the recognizer.
//! Every temp file is a [`tempfile::TempPath`] guard, so both the original and the converted
//! file are gone once [`Transcriber::transcribe`] returns, whichever path it returns on.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempPath;
use thiserror::Error;

use super::audio::{AudioError, AudioSource, RecordedAudio, convert_to_wav};
use super::recognition::{Recognition, RecognitionError, SpeechRecognizer};

/// Leading window used for ambient-noise calibration.
const CALIBRATION_WINDOW: Duration = Duration::from_secs(1);

/// Errors raised while turning an upload into a transcript.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// Temp file handling failed.
    #[error("temporary audio file error: {0}")]
    Io(#[from] std::io::Error),
    /// The upload could not be decoded or converted.
    #[error("Failed to convert audio to WAV format: {0}")]
    Audio(#[from] AudioError),
    /// The recognition service could not be consulted.
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    /// The blocking worker panicked or was cancelled.
    #[error("audio worker failed: {0}")]
    Task(String),
}

/// Transcribes uploaded audio through a [`SpeechRecognizer`].
pub struct Transcriber {
    recognizer: Arc<dyn SpeechRecognizer>,
    temp_dir: PathBuf,
}

impl Transcriber {
    /// Create a transcriber writing scratch files under `temp_dir`.
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            recognizer,
            temp_dir: temp_dir.into(),
        }
    }

    /// Transcribe an uploaded file.
    ///
    /// `filename` only contributes its extension, which decides whether conversion is needed
    /// and serves as a decoder hint. A recording with no frames is reported as
    /// [`Recognition::NotUnderstood`] without contacting the recognizer.
    pub async fn transcribe(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Recognition, TranscriptionError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let temp_dir = self.temp_dir.clone();

        let recorded = tokio::task::spawn_blocking(move || {
            prepare_recording(&temp_dir, extension.as_deref(), &bytes)
        })
        .await
        .map_err(|error| TranscriptionError::Task(error.to_string()))??;

        if recorded.frames == 0 {
            tracing::info!(filename, "Uploaded audio contains no frames");
            return Ok(Recognition::NotUnderstood);
        }

        tracing::debug!(
            filename,
            frames = recorded.frames,
            seconds = recorded.duration.as_secs_f64(),
            "Submitting recording for recognition"
        );
        let recognition = self.recognizer.recognize(recorded.wav).await?;
        if recognition == Recognition::NotUnderstood {
            tracing::info!(filename, "Recognizer could not understand the audio");
        }
        Ok(recognition)
    }
}

fn prepare_recording(
    temp_dir: &Path,
    extension: Option<&str>,
    bytes: &[u8],
) -> Result<RecordedAudio, TranscriptionError> {
    std::fs::create_dir_all(temp_dir)?;
    let original = persist_upload(temp_dir, extension, bytes)?;

    // Holds whichever file is the WAV; the original guard is closed early once converted.
    let wav: TempPath = if extension == Some("wav") {
        original
    } else {
        let converted = tempfile::Builder::new()
            .prefix("audio-")
            .suffix(".wav")
            .tempfile_in(temp_dir)?
            .into_temp_path();
        convert_to_wav(&original, &converted, extension)?;
        original.close()?;
        converted
    };

    let source = AudioSource::open(&wav)?;
    let threshold = source.adjust_for_ambient_noise(CALIBRATION_WINDOW)?;
    tracing::debug!(threshold, "Calibrated ambient energy threshold");
    Ok(source.record())
}

fn persist_upload(
    temp_dir: &Path,
    extension: Option<&str>,
    bytes: &[u8],
) -> Result<TempPath, std::io::Error> {
    let suffix = extension.map(|ext| format!(".{ext}")).unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(temp_dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file.into_temp_path())
}
