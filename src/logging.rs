//! Logging Configuration
//!
//! Structured logging with configurable level and format plus request id
//! tracking for the HTTP layer. Logs always go to stderr so that JSON results
//! printed by the CLI stay machine-readable on stdout.

use crate::config::LoggingSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log format configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human-readable text
    #[default]
    Plain,
    /// Multi-line human-readable text
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Log level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,

    /// Include span open/close events
    pub span_events: bool,

    /// Include file and line number in logs
    pub file_and_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Plain,
            span_events: false,
            file_and_line: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Build from the `[logging]` section of the configuration file
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self> {
        Ok(Self {
            level: settings.level.parse().map_err(anyhow::Error::msg)?,
            format: settings.format.parse().map_err(anyhow::Error::msg)?,
            ..Default::default()
        })
    }

    /// Raise the level to `debug` (`--verbose`)
    pub fn verbose(mut self, verbose: bool) -> Self {
        if verbose && !matches!(self.level, LogLevel::Trace | LogLevel::Debug) {
            self.level = LogLevel::Debug;
        }
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Initialize the global subscriber
    ///
    /// `RUST_LOG` takes precedence over the configured level.
    pub fn init(&self) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.file_and_line)
            .with_line_number(self.file_and_line)
            .with_target(true)
            .with_span_events(self.span_events());

        let layer = match self.format {
            LogFormat::Plain => base.compact().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Json => base
                .json()
                .with_current_span(true)
                .with_filter(filter)
                .boxed(),
        };

        tracing_subscriber::registry().with(layer).try_init()?;

        tracing::debug!(
            "Logging initialized: level={}, format={:?}",
            self.level,
            self.format
        );

        Ok(())
    }
}

/// Request ID for correlating log entries of one HTTP request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(pub uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_into_tracing() {
        let level: tracing::Level = LogLevel::Trace.into();
        assert_eq!(level, tracing::Level::TRACE);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("compact".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            level: "warn".to_string(),
            format: "json".to_string(),
        };
        let config = LoggingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Json);

        let bad = LoggingSettings {
            level: "nope".to_string(),
            ..settings
        };
        assert!(LoggingConfig::from_settings(&bad).is_err());
    }

    #[test]
    fn test_verbose_raises_level() {
        assert_eq!(LoggingConfig::default().verbose(true).level, LogLevel::Debug);
        assert_eq!(LoggingConfig::default().verbose(false).level, LogLevel::Info);
        assert_eq!(
            LoggingConfig::with_level(LogLevel::Trace).verbose(true).level,
            LogLevel::Trace
        );
    }

    #[test]
    fn test_request_id_unique() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string().len(), 36);
    }
}
