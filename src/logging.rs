//! Structured logging configuration
//!
//! Provides:
//! - JSON output for machine consumption
//! - Pretty formatting for development
//! - Console, daily-rolling file, or both
//! - A per-run span carrying a generated run id

use crate::config::{Config, LoggingConfig};
use std::path::Path;
use tracing::Span;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};
use uuid::Uuid;

pub const LOG_FILE_PREFIX: &str = "ticket-analytics.log";

/// Initialize the logging system based on configuration.
///
/// The returned guard flushes file output when dropped, so the caller must hold it
/// for the lifetime of the process. `RUST_LOG` takes precedence over the configured
/// level.
pub fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let LoggingConfig {
        level,
        format,
        output,
    } = &config.logging;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match output.as_str() {
        "file" => init_file_logging(env_filter, format, &config.paths.log_directory),
        "both" => init_combined_logging(env_filter, format, &config.paths.log_directory),
        _ => {
            init_console_logging(env_filter, format);
            None
        }
    }
}

fn init_console_logging(filter: EnvFilter, format: &str) {
    let subscriber = tracing_subscriber::registry().with(filter);

    // try_init: a subscriber may already be installed (tests, embedding callers)
    let _ = match format {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        _ => subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .pretty(),
            )
            .try_init(),
    };
}

fn file_writer(log_dir: &Path) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!(
            "Cannot create log directory {}: {}; logging to console only",
            log_dir.display(),
            e
        );
        return None;
    }
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(file_appender))
}

fn init_file_logging(filter: EnvFilter, format: &str, log_dir: &Path) -> Option<WorkerGuard> {
    let Some((non_blocking, guard)) = file_writer(log_dir) else {
        init_console_logging(filter, format);
        return None;
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    let _ = match format {
        "json" => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .try_init(),
    };

    Some(guard)
}

fn init_combined_logging(filter: EnvFilter, format: &str, log_dir: &Path) -> Option<WorkerGuard> {
    let Some((non_blocking, guard)) = file_writer(log_dir) else {
        init_console_logging(filter, format);
        return None;
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    let _ = match format {
        "json" => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(fmt::layer().json().with_writer(non_blocking))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
            .try_init(),
    };

    Some(guard)
}

/// Span wrapping one analysis run, tagged with a fresh run id.
pub fn analysis_span(command: &str) -> Span {
    tracing::info_span!("analysis", run_id = %Uuid::new_v4(), command = %command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_init_is_repeatable() {
        let config = Config::default();
        assert!(init_logging(&config).is_none());
        assert!(init_logging(&config).is_none());
    }

    #[test]
    fn test_file_output_returns_guard() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.logging.output = "file".to_string();
        config.paths.log_directory = dir.path().join("logs");

        let guard = init_logging(&config);
        assert!(guard.is_some());
        assert!(config.paths.log_directory.exists());
    }
}
