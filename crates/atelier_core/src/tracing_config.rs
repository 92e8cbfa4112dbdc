//! Tracing and observability setup.
//!
//! [`TracingConfig`] describes how the `tracing` subscriber should be installed
//! and [`TracingConfig::init`] installs it. Library crates only emit events;
//! binaries and test harnesses decide whether a subscriber exists.
//!
//! # Example
//!
//! ```no_run
//! use atelier_core::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! // Development: pretty output with debug level
//! TracingConfig::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Pretty)
//!     .init();
//!
//! // Production: JSON output for log aggregation
//! TracingConfig::default()
//!     .with_format(TracingFormat::Json)
//!     .with_env_filter("atelier=info,reqwest=warn,hyper=warn")
//!     .init();
//! ```

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

impl TracingFormat {
    /// Parses a format name (`pretty`, `compact`, `json`), case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Tracing subscriber configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Maximum log level, used when no env filter is given.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
    /// Environment filter (e.g., "atelier=debug,hyper=warn").
    pub env_filter: Option<String>,
    /// Whether to include span enter/exit events.
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from `ATELIER_LOG` (filter) and `ATELIER_LOG_FORMAT`.
    ///
    /// Unset or unparsable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var("ATELIER_LOG") {
            config.env_filter = Some(filter);
        }
        if let Some(format) = std::env::var("ATELIER_LOG_FORMAT")
            .ok()
            .as_deref()
            .and_then(TracingFormat::parse)
        {
            config.format = format;
        }
        config
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter string.
    ///
    /// Format: `target=level,target=level,...`
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    /// Installs the global subscriber.
    ///
    /// Returns `false` if a subscriber was already installed (the existing one
    /// is kept).
    pub fn init(&self) -> bool {
        let env_filter = self.build_filter();

        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let installed = match self.format {
            TracingFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Compact => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
            TracingFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init()
                .is_ok(),
        };

        if installed {
            tracing::info!(
                level = %self.level,
                format = ?self.format,
                "tracing initialized"
            );
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_format_default_is_pretty() {
        assert_eq!(TracingFormat::default(), TracingFormat::Pretty);
    }

    #[test]
    fn tracing_format_parse() {
        assert_eq!(TracingFormat::parse("JSON"), Some(TracingFormat::Json));
        assert_eq!(TracingFormat::parse("compact"), Some(TracingFormat::Compact));
        assert_eq!(TracingFormat::parse("fancy"), None);
    }

    #[test]
    fn tracing_config_builders() {
        let config = TracingConfig::new()
            .with_level(Level::DEBUG)
            .with_format(TracingFormat::Json)
            .with_env_filter("atelier=debug")
            .with_span_events(true);

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, TracingFormat::Json);
        assert_eq!(config.env_filter.as_deref(), Some("atelier=debug"));
        assert!(config.span_events);
    }

    #[test]
    fn second_init_keeps_existing_subscriber() {
        let config = TracingConfig::new().with_format(TracingFormat::Compact);
        config.init();
        assert!(!config.init());
    }
}
