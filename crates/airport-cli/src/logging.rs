//! Structured logging for the airport CLI
//!
//! - Human-readable console logging for interactive use
//! - Structured JSON logging for pipelines
//! - Daily-rotated log files

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format
    Pretty,
    /// JSON format (structured logging)
    Json,
    /// Compact format
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr only
    Stderr,
    /// Log to file only
    File,
    /// Log to both stderr and file
    Both,
}

impl LogOutput {
    /// `stdout` selects the console; it writes to stderr so scan output stays clean.
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stderr,
        }
    }
}

/// Filter from the configured level with noisy transports clamped to warn.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))?
        .add_directive("h2=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("tower=warn".parse()?)
        .add_directive("tonic=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);
    Ok(filter)
}

/// Initialize the logging system
///
/// Examples:
/// ```bash
/// # Interactive: pretty console output at debug level
/// RUST_LOG=debug airport schemas
///
/// # Pipelines: JSON to file
/// LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/airport airport scan main events
/// ```
pub fn init(config: &LoggingConfig) -> Result<()> {
    let format = LogFormat::parse(&config.format);
    let output = LogOutput::parse(&config.output);
    let filter = env_filter(&config.level)?;

    let console_layer = match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    };

    match output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .try_init()?;
        }
        LogOutput::File | LogOutput::Both => {
            std::fs::create_dir_all(&config.directory)?;
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, &config.directory, "airport.log");
            let file_layer = fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .boxed();
            let console_layer = (output == LogOutput::Both).then_some(console_layer);

            tracing_subscriber::registry()
                .with(filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()?;
        }
    }

    tracing::debug!(format = ?format, output = ?output, level = %config.level, "Logging initialized");
    Ok(())
}
