//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and, when possible, to a file as well:
//!
//! - `TEXT_SUMMARIZER_LOG_FILE=<path>` appends to that exact file.
//! - `TEXT_SUMMARIZER_LOG_FILE=off` disables file logging.
//! - Otherwise a daily-rotated file is kept under `logs/text-summarizer.log.<date>`.
//!
//! File output uses a non-blocking writer so request handlers never wait on disk.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "TEXT_SUMMARIZER_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_PREFIX: &str = "text-summarizer.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where file logs should be written.
#[derive(Debug, PartialEq, Eq)]
enum LogDestination {
    Disabled,
    File(PathBuf),
    DailyRotation { directory: PathBuf, prefix: String },
}

impl LogDestination {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("off") || v.eq_ignore_ascii_case("none") => {
                Self::Disabled
            }
            Some(v) if !v.is_empty() => Self::File(PathBuf::from(v)),
            _ => Self::DailyRotation {
                directory: PathBuf::from(DEFAULT_LOG_DIR),
                prefix: DEFAULT_LOG_PREFIX.to_string(),
            },
        }
    }
}

/// Configure tracing subscribers for stdout and optional file logging.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let destination = LogDestination::from_env_value(std::env::var(LOG_FILE_ENV).ok().as_deref());
    match configure_file_writer(destination) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

/// Build a non-blocking writer for the chosen destination.
///
/// Returns `None` when file logging is disabled or the target cannot be opened.
fn configure_file_writer(destination: LogDestination) -> Option<NonBlocking> {
    let (non_blocking, guard) = match destination {
        LogDestination::Disabled => return None,
        LogDestination::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        LogDestination::DailyRotation { directory, prefix } => {
            std::fs::create_dir_all(&directory)
                .map_err(|err| eprintln!("Failed to create logs directory: {err}"))
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
