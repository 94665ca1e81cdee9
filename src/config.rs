use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Default base URL of the hosted inference provider.
pub const DEFAULT_HF_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";
/// Default sequence-to-sequence summarization model.
pub const DEFAULT_SUMMARIZATION_MODEL: &str = "sshleifer/distilbart-cnn-12-6";
/// Default speech-recognition model.
pub const DEFAULT_SPEECH_RECOGNITION_MODEL: &str = "openai/whisper-large-v3";
/// Default remote text-to-speech endpoint.
pub const DEFAULT_TTS_URL: &str = "https://translate.google.com/translate_tts";
/// Default directory for temporary audio artifacts.
pub const DEFAULT_TEMP_DIR: &str = "/tmp/audio_files";
/// Frontend origins allowed to call the API when `CORS_ORIGINS` is not set.
pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "https://text-summarizer-frontend.onrender.com",
    "https://text-summarizer.vercel.app",
];

const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the summarizer server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Access token forwarded to the inference provider.
    pub hf_token: Option<String>,
    /// Base URL under which inference models are addressed.
    pub hf_inference_url: String,
    /// Model identifier used for summarization.
    pub summarization_model: String,
    /// Model identifier used for speech recognition.
    pub speech_recognition_model: String,
    /// Remote text-to-speech endpoint.
    pub tts_url: String,
    /// Language requested from the text-to-speech endpoint.
    pub tts_language: String,
    /// Directory holding temporary audio artifacts.
    pub temp_dir: PathBuf,
    /// Frontend origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Timeout applied to every provider HTTP request.
    pub provider_timeout_secs: u64,
    /// Number of chunk summaries requested concurrently.
    pub summary_concurrency: usize,
    /// Upper bound on concurrent PDF page extraction tasks.
    pub pdf_workers: usize,
    /// Maximum accepted request body size.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            hf_token: load_env_optional("HF_TOKEN"),
            hf_inference_url: load_env_or("HF_INFERENCE_URL", DEFAULT_HF_INFERENCE_URL),
            summarization_model: load_env_or("SUMMARIZATION_MODEL", DEFAULT_SUMMARIZATION_MODEL),
            speech_recognition_model: load_env_or(
                "SPEECH_RECOGNITION_MODEL",
                DEFAULT_SPEECH_RECOGNITION_MODEL,
            ),
            tts_url: load_env_or("TTS_URL", DEFAULT_TTS_URL),
            tts_language: load_env_or("TTS_LANGUAGE", "en"),
            temp_dir: PathBuf::from(load_env_or("TEMP_DIR", DEFAULT_TEMP_DIR)),
            cors_origins: load_env_optional("CORS_ORIGINS")
                .map(|value| parse_origins(&value))
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect()),
            server_port: load_parsed_optional("SERVER_PORT")?,
            provider_timeout_secs: load_parsed_optional("PROVIDER_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            summary_concurrency: positive(
                "SUMMARY_CONCURRENCY",
                load_parsed_optional("SUMMARY_CONCURRENCY")?.unwrap_or(1),
            )?,
            pdf_workers: positive(
                "PDF_WORKERS",
                load_parsed_optional("PDF_WORKERS")?.unwrap_or_else(default_pdf_workers),
            )?,
            max_upload_bytes: load_parsed_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_parsed_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn positive(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

fn default_pdf_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
pub(crate) fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<(), ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        inference_url = %config.hf_inference_url,
        summarization_model = %config.summarization_model,
        speech_recognition_model = %config.speech_recognition_model,
        temp_dir = %config.temp_dir.display(),
        server_port = ?config.server_port,
        has_token = config.hf_token.is_some(),
        "Loaded configuration"
    );
    CONFIG.get_or_init(|| config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_trims_and_drops_blanks() {
        let origins = parse_origins(" http://a.test/ , ,https://b.test");
        assert_eq!(origins, vec!["http://a.test", "https://b.test"]);
    }

    #[test]
    fn positive_rejects_zero() {
        assert!(matches!(
            positive("PDF_WORKERS", 0),
            Err(ConfigError::InvalidValue(key)) if key == "PDF_WORKERS"
        ));
        assert_eq!(positive("PDF_WORKERS", 3).unwrap(), 3);
    }

    #[test]
    fn default_origins_cover_local_frontends() {
        assert!(DEFAULT_CORS_ORIGINS.contains(&"http://localhost:5173"));
        assert!(DEFAULT_CORS_ORIGINS.contains(&"http://localhost:3000"));
    }
}
