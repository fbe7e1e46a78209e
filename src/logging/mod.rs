/*!
 * Logging Module
 * Console plus daily rolling files, JSON in production
 */
pub mod config;
pub mod middleware;

use std::io;
use std::path::Path;
use tracing_appender::{
    non_blocking,
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

pub use config::{LogConfig, LogLevel};

/// Background writer guards. Dropping them flushes and stops the writers,
/// so hold this for the life of the process.
#[must_use = "dropping the guards stops the log writers"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Daily rolling file writer, or None when the file cannot be opened.
fn daily_file(
    directory: &Path,
    name: &str,
    guards: &mut Vec<WorkerGuard>,
) -> Option<NonBlocking> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name)
        .build(directory);
    match appender {
        Ok(appender) => {
            let (writer, guard) = non_blocking(appender);
            guards.push(guard);
            Some(writer)
        }
        Err(e) => {
            eprintln!(
                "Logging {} to console only, cannot open {}: {}",
                name,
                directory.display(),
                e
            );
            None
        }
    }
}

/// Initialize the logging system
pub fn init(config: &LogConfig) -> Result<LogGuards, tracing_subscriber::util::TryInitError> {
    let mut guards = Vec::new();
    let file_writer = daily_file(&config.directory, "app.log", &mut guards);
    let error_writer = daily_file(&config.directory, "error.log", &mut guards);
    let (console_writer, console_guard) = non_blocking(io::stdout());
    guards.push(console_guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.is_production() {
        let file_layer = file_writer.map(|writer| {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
        });

        let error_layer = error_writer.map(|writer| {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(LevelFilter::ERROR)
        });

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()?;
    } else {
        let file_layer = file_writer.map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
        });

        let error_layer = error_writer.map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_filter(LevelFilter::ERROR)
        });

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()?;
    }

    tracing::info!(
        "Logging initialized for {} environment at {} level",
        config.environment,
        config.level
    );

    Ok(LogGuards { _guards: guards })
}
