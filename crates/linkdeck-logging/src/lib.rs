//! Logging setup for Linkdeck binaries and tests
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines on the console by default
//! - **Pretty Output**: human-readable console output for development
//! - **File Rotation**: daily/hourly rolling files via tracing-appender
//! - **Env Override**: `RUST_LOG` replaces the configured filter
//!
//! # Quick Start
//!
//! ```ignore
//! use linkdeck_logging::{LinkdeckSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! LinkdeckSubscriberBuilder::new().init();
//!
//! // Development mode with pretty output
//! LinkdeckSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//!
//! // Keep the guard alive while logging to files
//! let _guard = LinkdeckSubscriberBuilder::new()
//!     .with_config(LogConfig::production("./logs".into()))
//!     .init();
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for configuring and installing the global subscriber
#[derive(Debug, Clone, Default)]
pub struct LinkdeckSubscriberBuilder {
    config: LogConfig,
}

impl LinkdeckSubscriberBuilder {
    /// Default: JSONL to console at `info`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Human-readable console output instead of JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Override the level of one target
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config.targets.insert(target.into(), level.into());
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output on drop; keep it alive for
    /// the life of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.directives())?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            let console = if self.config.console.pretty {
                tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true)
                    .boxed()
            } else {
                json_layer(&self.config.jsonl, std::io::stdout)
            };
            layers.push(console);
        }

        if let Some(file) = &self.config.file {
            let (writer, file_guard) = file_writer(file)?;
            layers.push(json_layer(&self.config.jsonl, writer));
            guard = Some(file_guard);
        }

        Registry::default().with(layers).with(filter).try_init()?;
        Ok(guard)
    }

    /// Install the subscriber, reporting failure on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: failed to initialize logging: {e}");
                None
            }
        }
    }
}

fn json_layer<W>(jsonl: &JsonlConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_writer(writer)
        .boxed()
}

/// Non-blocking writer for the configured file output
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory)?;
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// JSONL to console at `info`
pub fn init_default() -> Option<WorkerGuard> {
    LinkdeckSubscriberBuilder::new().init()
}

/// Verbose pretty console output
pub fn init_development() -> Option<WorkerGuard> {
    LinkdeckSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Minimal output; safe to call from every test
pub fn init_testing() {
    let _ = LinkdeckSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_jsonl() {
        let builder = LinkdeckSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty);
    }

    #[test]
    fn test_builder_setters() {
        let builder = LinkdeckSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_target("tower_http", "debug");
        assert_eq!(builder.config().directives(), "trace,tower_http=debug");
        assert!(!builder.config().console.enabled);
    }

    #[test]
    fn test_single_file_writer_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("nested"),
            prefix: "relay".into(),
            rotation: RotationStrategy::Never,
            max_files: None,
        };
        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("nested/relay.log").exists());
    }

    #[test]
    fn test_rolling_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("rolling"),
            ..FileConfig::default()
        };
        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("rolling").is_dir());
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        // Only meaningful when RUST_LOG does not take precedence
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let result = LinkdeckSubscriberBuilder::new()
            .with_level("info")
            .with_target("linkdeck", "not-a-level")
            .try_init();
        assert!(matches!(result, Err(LoggingError::Filter(_))));
    }
}
