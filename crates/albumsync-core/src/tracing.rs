//! Logging setup shared by the daemon and the CLI.
//!
//! ```ignore
//! use albumsync_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::daemon())?;
//! ```
//!
//! `RUST_LOG` wins over the configured level when it is set.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Target prefix every crate in the workspace logs under.
const TARGET_PREFIX: &str = "albumsync";

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Structured output for the daemon.
    Json,
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level applied to `albumsync*` targets when `RUST_LOG` is unset.
    pub default_level: Level,
    pub output_format: TracingOutputFormat,
    /// Include file and line of the call site.
    pub include_location: bool,
    pub include_target: bool,
    pub include_timestamp: bool,
    /// Log span open/close, useful for per-request timing in the daemon.
    pub include_span_events: bool,
    /// Full filter directive; replaces `default_level` when set.
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Pretty,
            include_location: false,
            include_target: true,
            include_timestamp: true,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Quiet CLI output: warnings and errors only, no timestamps.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            default_level: Level::WARN,
            output_format: TracingOutputFormat::Compact,
            include_target: false,
            include_timestamp: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Compact,
            include_location: true,
            include_timestamp: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn daemon() -> Self {
        Self {
            output_format: TracingOutputFormat::Json,
            include_location: true,
            include_span_events: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(directive) = &self.env_filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directive())))
    }

    fn default_directive(&self) -> String {
        format!("{TARGET_PREFIX}={}", self.default_level)
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target)
            .with_span_events(self.span_events());

        match (self.output_format, self.include_timestamp) {
            (TracingOutputFormat::Pretty, true) => base.pretty().boxed(),
            (TracingOutputFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
            (TracingOutputFormat::Json, true) => base.json().boxed(),
            (TracingOutputFormat::Json, false) => base.json().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once per process.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the filter directive is
/// invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
