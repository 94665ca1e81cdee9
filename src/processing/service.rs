//! Processing service coordinating extraction, summarization, transcription, and synthesis.

use crate::{
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        extract::extract_text,
        summarize::{CompositionPolicy, compose_summary},
        types::{Action, DocumentOutcome, ProcessingError, TranscriptionOutcome},
    },
    speech::{Recognition, SpeechSynthesizer, SynthesizedAudio, Transcriber, VoiceType},
    summarization::SummarizationClient,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Coordinates every request pipeline behind the HTTP surface.
///
/// The service owns long-lived handles to the summarization client, the transcriber, the
/// synthesizer, and the metrics registry. Construct it once near process start and share it
/// through an `Arc`; all methods take `&self` and are safe to call concurrently.
pub struct ProcessingService {
    summarizer: Arc<dyn SummarizationClient>,
    transcriber: Arc<Transcriber>,
    synthesizer: Arc<SpeechSynthesizer>,
    metrics: Arc<ServiceMetrics>,
    policy: CompositionPolicy,
    pdf_workers: usize,
}

/// Abstraction over the processing pipelines used by the HTTP layer.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Extract text from an uploaded document and apply `action` to it.
    async fn process_document(
        &self,
        content: Vec<u8>,
        content_type: &str,
        action: Action,
    ) -> Result<DocumentOutcome, ProcessingError>;

    /// Transcribe an uploaded audio file and summarize the transcript.
    async fn transcribe_audio(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<TranscriptionOutcome, ProcessingError>;

    /// Synthesize `text` to an MP3 file that lives as long as the returned guard.
    async fn synthesize_speech(
        &self,
        text: &str,
        voice: VoiceType,
    ) -> Result<SynthesizedAudio, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl ProcessingService {
    /// Assemble the service from already-initialized components.
    pub fn new(
        summarizer: Arc<dyn SummarizationClient>,
        transcriber: Arc<Transcriber>,
        synthesizer: Arc<SpeechSynthesizer>,
        policy: CompositionPolicy,
        pdf_workers: usize,
    ) -> Self {
        Self {
            summarizer,
            transcriber,
            synthesizer,
            metrics: Arc::new(ServiceMetrics::new()),
            policy,
            pdf_workers: pdf_workers.max(1),
        }
    }

    /// Extract and summarize a document.
    ///
    /// Extraction runs before the action is inspected, so an unreadable upload is reported as
    /// an error even when the action is unsupported.
    pub async fn process_document(
        &self,
        content: Vec<u8>,
        content_type: &str,
        action: Action,
    ) -> Result<DocumentOutcome, ProcessingError> {
        tracing::info!(content_type, bytes = content.len(), ?action, "Processing document");
        let text = extract_text(content, content_type, self.pdf_workers).await?;

        match action {
            Action::Summarize => {
                let summary = compose_summary(&text, self.summarizer.as_ref(), &self.policy).await?;
                self.metrics.record_document(&summary);
                tracing::info!(
                    chunks = summary.chunk_count,
                    summarized = summary.summarized_chunks,
                    fallbacks = summary.fallbacks,
                    condensed = summary.condensed,
                    "Document summarized"
                );
                Ok(DocumentOutcome::Summarized(summary))
            }
            Action::Unsupported(action) => {
                tracing::warn!(action = %action, "Unsupported document action");
                Ok(DocumentOutcome::UnsupportedAction(action))
            }
        }
    }

    /// Transcribe audio and compose a summary of the transcript.
    pub async fn transcribe_audio(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<TranscriptionOutcome, ProcessingError> {
        tracing::info!(filename, bytes = content.len(), "Transcribing audio");
        let text = match self.transcriber.transcribe(filename, content).await? {
            Recognition::Transcript(text) => text,
            Recognition::NotUnderstood => return Ok(TranscriptionOutcome::NotUnderstood),
        };

        let summary = compose_summary(&text, self.summarizer.as_ref(), &self.policy).await?;
        self.metrics.record_transcription(&summary);
        tracing::info!(
            words = text.split_whitespace().count(),
            condensed = summary.condensed,
            "Audio transcribed"
        );
        Ok(TranscriptionOutcome::Transcribed { text, summary })
    }

    /// Synthesize speech for `text`.
    pub async fn synthesize_speech(
        &self,
        text: &str,
        voice: VoiceType,
    ) -> Result<SynthesizedAudio, ProcessingError> {
        let audio = self.synthesizer.synthesize(text, voice).await?;
        self.metrics.record_synthesis();
        Ok(audio)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn process_document(
        &self,
        content: Vec<u8>,
        content_type: &str,
        action: Action,
    ) -> Result<DocumentOutcome, ProcessingError> {
        ProcessingService::process_document(self, content, content_type, action).await
    }

    async fn transcribe_audio(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<TranscriptionOutcome, ProcessingError> {
        ProcessingService::transcribe_audio(self, filename, content).await
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        voice: VoiceType,
    ) -> Result<SynthesizedAudio, ProcessingError> {
        ProcessingService::synthesize_speech(self, text, voice).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ProcessingService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{RecognitionError, SpeechEngine, SpeechRecognizer, SynthesisError};
    use crate::summarization::{SummarizationClientError, SummarizationRequest};

    struct EchoSummarizer;

    #[async_trait]
    impl SummarizationClient for EchoSummarizer {
        async fn summarize(
            &self,
            request: SummarizationRequest,
        ) -> Result<String, SummarizationClientError> {
            Ok(format!("summary of {} chars", request.text.chars().count()))
        }
    }

    struct FixedRecognizer(Recognition);

    #[async_trait]
    impl SpeechRecognizer for FixedRecognizer {
        async fn recognize(&self, _wav: Vec<u8>) -> Result<Recognition, RecognitionError> {
            Ok(self.0.clone())
        }
    }

    struct SilentEngine;

    #[async_trait]
    impl SpeechEngine for SilentEngine {
        async fn synthesize(
            &self,
            _text: &str,
            _voice: VoiceType,
        ) -> Result<Vec<u8>, SynthesisError> {
            Ok(b"ID3".to_vec())
        }
    }

    fn service(dir: &std::path::Path, recognition: Recognition) -> ProcessingService {
        ProcessingService::new(
            Arc::new(EchoSummarizer),
            Arc::new(Transcriber::new(Arc::new(FixedRecognizer(recognition)), dir)),
            Arc::new(SpeechSynthesizer::new(Arc::new(SilentEngine), dir)),
            CompositionPolicy::default(),
            2,
        )
    }

    fn speech_wav() -> Vec<u8> {
        let samples: Vec<i16> = (0..8_000).map(|i| ((i % 40) * 200) as i16).collect();
        crate::speech::audio::encode_wav(&samples, 8_000).unwrap()
    }

    #[tokio::test]
    async fn short_document_is_returned_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = service(dir.path(), Recognition::NotUnderstood)
            .process_document(b"Hello   world!!".to_vec(), "text/plain", Action::Summarize)
            .await
            .unwrap();

        let DocumentOutcome::Summarized(summary) = outcome else {
            panic!("expected summary");
        };
        assert_eq!(summary.overall, "Hello world!!");
    }

    #[tokio::test]
    async fn unsupported_action_is_reported_after_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Recognition::NotUnderstood);

        let outcome = service
            .process_document(b"text".to_vec(), "text/plain", Action::parse(Some("translate")))
            .await
            .unwrap();
        assert_eq!(outcome, DocumentOutcome::UnsupportedAction("translate".into()));

        let error = service
            .process_document(vec![0xff], "text/plain", Action::parse(Some("translate")))
            .await
            .expect_err("extraction failure wins");
        assert!(matches!(error, ProcessingError::Extraction(_)));
        assert_eq!(service.metrics_snapshot().documents_processed, 0);
    }

    #[tokio::test]
    async fn long_document_updates_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Recognition::NotUnderstood);
        let sentence = "The quarterly report describes revenue growth across every region. ";
        let text = sentence.repeat(40);

        let outcome = service
            .process_document(text.into_bytes(), "text/plain; charset=utf-8", Action::Summarize)
            .await
            .unwrap();

        let DocumentOutcome::Summarized(summary) = outcome else {
            panic!("expected summary");
        };
        assert!(summary.summarized_chunks >= 2);
        let metrics = service.metrics_snapshot();
        assert_eq!(metrics.documents_processed, 1);
        assert_eq!(metrics.chunks_summarized, summary.summarized_chunks as u64);
    }

    #[tokio::test]
    async fn transcript_is_summarized() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(
            dir.path(),
            Recognition::Transcript("hello from the recording".into()),
        );

        let outcome = service.transcribe_audio("memo.wav", speech_wav()).await.unwrap();

        let TranscriptionOutcome::Transcribed { text, summary } = outcome else {
            panic!("expected transcript");
        };
        assert_eq!(text, "hello from the recording");
        assert_eq!(summary.detailed, "hello from the recording");
        assert_eq!(service.metrics_snapshot().transcriptions, 1);
    }

    #[tokio::test]
    async fn not_understood_is_an_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Recognition::NotUnderstood);

        let outcome = service.transcribe_audio("memo.wav", speech_wav()).await.unwrap();

        assert_eq!(outcome, TranscriptionOutcome::NotUnderstood);
        assert_eq!(service.metrics_snapshot().transcriptions, 0);
    }

    #[tokio::test]
    async fn synthesis_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path(), Recognition::NotUnderstood);

        let audio = service
            .synthesize_speech("Hello.", VoiceType::Default)
            .await
            .unwrap();

        assert_eq!(audio.read().await.unwrap(), b"ID3");
        assert_eq!(service.metrics_snapshot().syntheses, 1);
    }
}
