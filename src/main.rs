use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use text_summarizer::{
    api::{self, ApiSettings},
    config, logging,
    processing::{CompositionPolicy, ProcessingService},
    speech::{GoogleTranslateTts, HuggingFaceRecognizer, SpeechSynthesizer, Transcriber},
    summarization::HuggingFaceSummarizer,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    config::init_config().context("Failed to load configuration")?;
    let config = config::get_config();
    let timeout = Duration::from_secs(config.provider_timeout_secs);

    let summarizer = HuggingFaceSummarizer::new(
        &config.hf_inference_url,
        &config.summarization_model,
        config.hf_token.clone(),
        timeout,
    )
    .context("Failed to build summarization client")?;
    let recognizer = HuggingFaceRecognizer::new(
        &config.hf_inference_url,
        &config.speech_recognition_model,
        config.hf_token.clone(),
        timeout,
    )
    .context("Failed to build speech recognition client")?;
    let engine = GoogleTranslateTts::new(&config.tts_url, &config.tts_language, timeout)
        .context("Failed to build text-to-speech client")?;
    tracing::info!(
        summarization_model = %config.summarization_model,
        speech_recognition_model = %config.speech_recognition_model,
        "Provider clients initialized"
    );

    let service = ProcessingService::new(
        Arc::new(summarizer),
        Arc::new(Transcriber::new(Arc::new(recognizer), &config.temp_dir)),
        Arc::new(SpeechSynthesizer::new(Arc::new(engine), &config.temp_dir)),
        CompositionPolicy::default().with_concurrency(config.summary_concurrency),
        config.pdf_workers,
    );
    let app = api::create_router(
        Arc::new(service),
        &ApiSettings {
            cors_origins: config.cors_origins.clone(),
            max_upload_bytes: config.max_upload_bytes,
        },
    );

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 8000-8099",
    ))
}
