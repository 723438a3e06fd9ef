//! Structured logging setup for fanlog
//!
//! Installs a `tracing` subscriber with JSONL or human-readable console
//! output and optional rotating JSONL files.
//!
//! # Quick Start
//!
//! ```ignore
//! use fanlog_logging::{FanlogSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! FanlogSubscriberBuilder::new().init()?;
//!
//! // Human-readable output during development
//! FanlogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```
//!
//! `RUST_LOG` takes precedence over the configured default level.

pub mod config;
pub mod error;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use error::LogError;
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Builder for configuring and installing the fanlog subscriber
///
/// By default, console output uses JSONL format. Use
/// [`LogConfig::development`] for human-readable output.
#[derive(Debug, Clone, Default)]
pub struct FanlogSubscriberBuilder {
    config: LogConfig,
}

impl FanlogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
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

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber globally
    ///
    /// With file output configured, the returned guard flushes the
    /// background writer on drop and must be held for the life of the
    /// program.
    ///
    /// # Errors
    ///
    /// Fails on an invalid level or target directive, if the log directory
    /// cannot be created, or if a global subscriber is already installed.
    pub fn init(self) -> Result<Option<WorkerGuard>, LogError> {
        let filter = self.env_filter()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if let Some(console) = self.console_layer() {
            layers.push(console);
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(self.jsonl_layer(writer));
            guard = Some(file_guard);
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(layers)
            .try_init()
            .map_err(|e| LogError::Init(e.to_string()))?;

        tracing::debug!(
            level = %self.config.default_level,
            console = self.config.console.enabled,
            pretty = self.config.console.pretty,
            file = ?self.config.file.as_ref().map(|f| &f.directory),
            "Logging initialized"
        );
        Ok(guard)
    }

    fn env_filter(&self) -> Result<EnvFilter, LogError> {
        let mut filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.config.default_level)
                .map_err(|e| LogError::Filter(e.to_string()))?,
        };

        for (target, level) in &self.config.targets {
            let directive = format!("{}={}", target, level)
                .parse()
                .map_err(|e| LogError::Filter(format!("{}={}: {}", target, level, e)))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }

    fn console_layer(&self) -> Option<BoxedLayer> {
        let console = &self.config.console;
        if !console.enabled {
            return None;
        }

        let layer = if console.pretty {
            fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .boxed()
        } else {
            self.jsonl_layer(std::io::stdout)
        };
        Some(layer)
    }

    fn jsonl_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        let jsonl = &self.config.jsonl;
        fmt::layer()
            .json()
            .with_current_span(jsonl.include_current_span)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_thread_ids(jsonl.include_thread_info)
            .with_thread_names(jsonl.include_thread_info)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }
}

/// Create the non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the rotating strategies append
/// to `<prefix>.<date>.log` and prune beyond `max_files`.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("log");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| LogError::Init(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Result<(), LogError> {
    FanlogSubscriberBuilder::new().init().map(|_| ())
}

/// Initialize logging for development (verbose, human-readable console)
pub fn init_development() -> Result<(), LogError> {
    FanlogSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Initialize logging for tests (warnings and above)
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = FanlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
