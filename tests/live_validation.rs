use std::{env, sync::Once, time::Duration};

use text_summarizer::{
    config,
    speech::{GoogleTranslateTts, SpeechEngine, VoiceType},
    summarization::{
        HuggingFaceSummarizer, SummarizationClient, SummarizationRequest, SummaryParams,
    },
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("PROVIDER_TIMEOUT_SECS", "180");
        config::init_config().expect("configuration");
    });
}

const ARTICLE: &str = "The city council approved a new transit plan on Tuesday after months of \
debate. The plan adds three bus rapid transit lines and extends light rail service to the \
airport. Officials said construction will begin next spring and finish within four years. \
Residents voiced concerns about noise and traffic during construction, but most speakers at \
the hearing supported the project. The council also approved funding for new bike lanes \
along the waterfront and a pilot program offering free fares to students.";

#[tokio::test]
#[ignore = "Requires Hugging Face inference access (HF_TOKEN)"]
async fn live_summarization_roundtrip() {
    init_config_once();
    let config = config::get_config();
    let client = HuggingFaceSummarizer::new(
        &config.hf_inference_url,
        &config.summarization_model,
        config.hf_token.clone(),
        Duration::from_secs(config.provider_timeout_secs),
    )
    .expect("summarization client");

    let summary = client
        .summarize(SummarizationRequest {
            text: ARTICLE.to_string(),
            params: SummaryParams::chunk(),
        })
        .await
        .expect("failed to request a summary from the provider");

    assert!(!summary.is_empty(), "summary should not be empty");
    assert!(
        summary.len() < ARTICLE.len(),
        "summary should be shorter than the input: {summary}"
    );
}

#[tokio::test]
#[ignore = "Requires network access to the TTS endpoint"]
async fn live_tts_returns_audio() {
    init_config_once();
    let config = config::get_config();
    let engine = GoogleTranslateTts::new(
        &config.tts_url,
        &config.tts_language,
        Duration::from_secs(config.provider_timeout_secs),
    )
    .expect("tts client");

    let audio = engine
        .synthesize("Hello from the summarizer.", VoiceType::Default)
        .await
        .expect("failed to synthesize speech");

    assert!(audio.len() > 1_000, "expected MP3 payload, got {} bytes", audio.len());
}
