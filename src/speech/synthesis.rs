//! Text-to-speech: an engine seam, the remote translate-style adapter, and the synthesizer that
//! materializes audio under the temp directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use tempfile::TempPath;
use thiserror::Error;
use uuid::Uuid;

/// Longest text segment sent in a single TTS request.
pub const MAX_SEGMENT_CHARS: usize = 100;

/// Errors raised while synthesizing speech.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Nothing speakable was supplied.
    #[error("Failed to convert text to speech: no speakable text")]
    EmptyText,
    /// The TTS service could not be reached.
    #[error("Failed to convert text to speech: {0}")]
    Request(String),
    /// The TTS service rejected a segment.
    #[error("Failed to convert text to speech: {0}")]
    Engine(String),
    /// Writing the audio file failed.
    #[error("Failed to convert text to speech: {0}")]
    Io(#[from] std::io::Error),
    /// The audio file is absent or empty after synthesis.
    #[error("Failed to create audio file: {}", .0.display())]
    MissingOutput(PathBuf),
}

/// Voice selector accepted by the synthesis endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VoiceType {
    /// Engine default voice.
    #[default]
    Default,
    /// Female voice where the engine offers one.
    Female,
}

impl VoiceType {
    /// Parse a client-supplied hint; anything unrecognized selects the default voice.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("female") => Self::Female,
            _ => Self::Default,
        }
    }
}

/// Interface implemented by TTS engines.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Render `text` as MP3 bytes.
    async fn synthesize(&self, text: &str, voice: VoiceType) -> Result<Vec<u8>, SynthesisError>;
}

/// Engine backed by a Google Translate style `translate_tts` endpoint.
///
/// The endpoint exposes a single voice per language, so the voice hint is ignored.
pub struct GoogleTranslateTts {
    http: Client,
    endpoint: String,
    language: String,
}

impl GoogleTranslateTts {
    /// Build an engine speaking `language` through `endpoint`.
    pub fn new(endpoint: &str, language: &str, timeout: Duration) -> Result<Self, SynthesisError> {
        let http = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; text-summarizer)")
            .timeout(timeout)
            .build()
            .map_err(|error| SynthesisError::Request(error.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            language: language.to_string(),
        })
    }
}

#[async_trait]
impl SpeechEngine for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, voice: VoiceType) -> Result<Vec<u8>, SynthesisError> {
        if voice != VoiceType::Default {
            tracing::debug!(?voice, "Remote TTS has a single voice; ignoring hint");
        }
        let segments = split_segments(text, MAX_SEGMENT_CHARS);
        if segments.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let total = segments.len().to_string();
        let mut audio = Vec::new();
        for (idx, segment) in segments.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = segment.chars().count().to_string();
            let response = self
                .http
                .get(&self.endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", segment.as_str()),
                    ("tl", self.language.as_str()),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .map_err(|error| SynthesisError::Request(error.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SynthesisError::Engine(format!(
                    "segment {idx} returned {status}: {body}"
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|error| SynthesisError::Request(error.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        tracing::debug!(segments = segments.len(), bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }
}

fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| {
        Regex::new(r"[.!?;:,\n\u{2026}\u{00a1}\u{00bf}()\[\]{}]").expect("valid punctuation regex")
    })
}

/// Split `text` into segments of at most `max_chars` characters.
///
/// Text is cut after punctuation first; pieces still too long are packed word by word, and a
/// single word longer than the limit is cut at the limit.
pub(crate) fn split_segments(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();
    let mut start = 0;
    for found in punctuation().find_iter(text) {
        push_piece(&text[start..found.end()], max_chars, &mut segments);
        start = found.end();
    }
    push_piece(&text[start..], max_chars, &mut segments);
    segments
}

fn push_piece(piece: &str, max_chars: usize, segments: &mut Vec<String>) {
    let piece = piece.trim();
    if piece.is_empty() || piece.chars().all(|c| !c.is_alphanumeric()) {
        return;
    }
    if piece.chars().count() <= max_chars {
        segments.push(piece.to_string());
        return;
    }

    let mut current = String::new();
    for word in piece.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed <= max_chars {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }
        if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        let chars: Vec<char> = word.chars().collect();
        let mut parts = chars.chunks(max_chars).peekable();
        while let Some(part) = parts.next() {
            let part: String = part.iter().collect();
            if parts.peek().is_some() {
                segments.push(part);
            } else {
                current = part;
            }
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
}

/// A synthesized MP3 on disk, deleted when dropped.
#[derive(Debug)]
pub struct SynthesizedAudio {
    path: TempPath,
}

impl SynthesizedAudio {
    /// Location of the audio file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the audio into memory.
    pub async fn read(&self) -> Result<Vec<u8>, SynthesisError> {
        Ok(tokio::fs::read(self.path()).await?)
    }
}

/// Writes engine output to uniquely named files under the temp directory.
pub struct SpeechSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    temp_dir: PathBuf,
}

impl SpeechSynthesizer {
    /// Create a synthesizer writing to `temp_dir`, which is created on first use.
    pub fn new(engine: Arc<dyn SpeechEngine>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            temp_dir: temp_dir.into(),
        }
    }

    /// Synthesize `text` into `{temp_dir}/{uuid}.mp3`.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: VoiceType,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let audio = self.engine.synthesize(text, voice).await?;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let path = self
            .temp_dir
            .join(format!("{}.mp3", Uuid::new_v4().simple()));
        let guard = TempPath::try_from_path(&path)?;
        tokio::fs::write(&path, &audio).await?;

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.len() > 0 => {}
            _ => return Err(SynthesisError::MissingOutput(path)),
        }
        tracing::info!(path = %path.display(), bytes = audio.len(), "Wrote synthesized speech");
        Ok(SynthesizedAudio { path: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    struct FixedEngine(Vec<u8>);

    #[async_trait]
    impl SpeechEngine for FixedEngine {
        async fn synthesize(
            &self,
            _text: &str,
            _voice: VoiceType,
        ) -> Result<Vec<u8>, SynthesisError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn voice_type_parsing_is_lenient() {
        assert_eq!(VoiceType::parse(Some("Female")), VoiceType::Female);
        assert_eq!(VoiceType::parse(Some("robot")), VoiceType::Default);
        assert_eq!(VoiceType::parse(Some("")), VoiceType::Default);
        assert_eq!(VoiceType::parse(None), VoiceType::Default);
    }

    #[test]
    fn short_text_is_split_on_punctuation() {
        assert_eq!(
            split_segments("Hello there. How are you?", 100),
            vec!["Hello there.", "How are you?"]
        );
    }

    #[test]
    fn punctuation_only_pieces_are_dropped() {
        assert_eq!(split_segments("Wait... what?!", 100), vec!["Wait.", "what?"]);
        assert!(split_segments("  ... ", 100).is_empty());
    }

    #[test]
    fn long_clauses_are_packed_by_words() {
        let text = "alpha beta gamma delta epsilon";
        let segments = split_segments(text, 11);
        assert_eq!(segments, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(segments.iter().all(|s| s.chars().count() <= 11));
    }

    #[test]
    fn oversized_words_are_cut() {
        assert_eq!(split_segments("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn remote_engine_requests_each_segment() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/translate_tts")
                    .query_param("q", "Hello there.")
                    .query_param("tl", "en")
                    .query_param("client", "tw-ob")
                    .query_param("total", "2")
                    .query_param("idx", "0")
                    .query_param("textlen", "12");
                then.status(200).body("AAA");
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/translate_tts")
                    .query_param("q", "Goodbye.")
                    .query_param("idx", "1");
                then.status(200).body("BB");
            })
            .await;

        let engine =
            GoogleTranslateTts::new(&server.url("/translate_tts"), "en", Duration::from_secs(5))
                .unwrap();
        let audio = engine
            .synthesize("Hello there. Goodbye.", VoiceType::Female)
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(audio, b"AAABB");
    }

    #[tokio::test]
    async fn remote_engine_reports_rejections() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(429).body("slow down");
            })
            .await;

        let engine = GoogleTranslateTts::new(&server.url("/tts"), "en", Duration::from_secs(5))
            .unwrap();
        let error = engine
            .synthesize("Hello.", VoiceType::Default)
            .await
            .expect_err("rejected");
        assert!(matches!(error, SynthesisError::Engine(ref message) if message.contains("429")));
    }

    #[tokio::test]
    async fn remote_engine_rejects_blank_text() {
        let engine = GoogleTranslateTts::new("http://127.0.0.1:9", "en", Duration::from_secs(1))
            .unwrap();
        let error = engine.synthesize("   ", VoiceType::Default).await.unwrap_err();
        assert!(matches!(error, SynthesisError::EmptyText));
    }

    #[tokio::test]
    async fn synthesized_file_lives_until_dropped() {
        let root = tempfile::tempdir().unwrap();
        let temp_dir = root.path().join("audio_files");
        let synthesizer =
            SpeechSynthesizer::new(Arc::new(FixedEngine(b"ID3audio".to_vec())), &temp_dir);

        let audio = synthesizer
            .synthesize("Hello.", VoiceType::Default)
            .await
            .unwrap();
        let path = audio.path().to_path_buf();
        assert!(path.starts_with(&temp_dir));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp3"));
        assert_eq!(audio.read().await.unwrap(), b"ID3audio");

        drop(audio);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn empty_engine_output_is_missing_output() {
        let root = tempfile::tempdir().unwrap();
        let synthesizer = SpeechSynthesizer::new(Arc::new(FixedEngine(Vec::new())), root.path());

        let error = synthesizer
            .synthesize("Hello.", VoiceType::Default)
            .await
            .expect_err("empty output");

        assert!(matches!(error, SynthesisError::MissingOutput(_)));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
