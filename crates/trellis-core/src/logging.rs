//! Logging setup.
//!
//! trellis emits `tracing` events from registration, lookup, body reading
//! and multipart decoding. Nothing is printed until the host installs a
//! subscriber; [`LogConfig::init`] installs a `tracing-subscriber` fmt
//! subscriber for hosts that do not bring their own.
//!
//! # Example
//!
//! ```no_run
//! use trellis_core::logging::{LogConfig, LogLevel};
//!
//! LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .json_output(false)
//!     .init()
//!     .ok();
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use std::fmt;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Minimum level to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, for detailed debugging.
    Trace,
    /// Debug information, not shown in production.
    Debug,
    /// General information about normal operation.
    Info,
    /// Something unexpected but recoverable.
    Warn,
    /// A failure.
    Error,
}

impl LogLevel {
    /// Returns the level as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Error returned when a global subscriber is already installed.
#[derive(Debug, thiserror::Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct InitError(String);

/// Configuration for the fmt subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum log level to emit.
    pub min_level: LogLevel,
    /// Whether to output JSON (true) or compact format (false).
    pub json_output: bool,
    /// Whether to include the target module path.
    pub include_target: bool,
    /// Restrict the level to this target prefix (e.g. `"trellis_router"`).
    pub target: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            json_output: true,
            include_target: true,
            target: None,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum log level.
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets whether to output JSON format.
    #[must_use]
    pub fn json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    /// Sets whether to include the target module path.
    #[must_use]
    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Applies the level to one target only.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Verbose compact output for local work.
    #[must_use]
    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            json_output: false,
            ..Self::default()
        }
    }

    /// Info and above, as JSON.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Everything, as compact output.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            min_level: LogLevel::Trace,
            json_output: false,
            ..Self::default()
        }
    }

    /// The `EnvFilter` directive this configuration stands for.
    #[must_use]
    pub fn directive(&self) -> String {
        match &self.target {
            Some(target) => format!("{target}={}", self.min_level),
            None => self.min_level.to_string(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }

    /// Install the global subscriber.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already set.
    pub fn init(&self) -> Result<(), InitError> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_target(self.include_target);

        let result = if self.json_output {
            builder.json().try_init()
        } else {
            builder.compact().try_init()
        };
        result.map_err(|e| InitError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_without_target_is_bare_level() {
        assert_eq!(LogConfig::development().directive(), "debug");
    }

    #[test]
    fn directive_scopes_to_target() {
        let config = LogConfig::new().level(LogLevel::Trace).target("trellis_http");
        assert_eq!(config.directive(), "trellis_http=trace");
    }

    #[test]
    fn presets() {
        assert!(LogConfig::production().json_output);
        assert!(!LogConfig::testing().json_output);
        assert_eq!(LogConfig::testing().min_level, LogLevel::Trace);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: LogConfig =
            serde_json::from_str(r#"{"min_level":"warn","json_output":false}"#).unwrap();
        assert_eq!(config.min_level, LogLevel::Warn);
        assert!(!config.json_output);
        assert!(config.include_target);
        assert_eq!(config.target, None);
    }

    #[test]
    fn second_init_fails() {
        // Only one global subscriber can be installed per process.
        let _ = LogConfig::testing().init();
        assert!(LogConfig::testing().init().is_err());
    }

    #[test]
    fn levels_map_to_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
        assert!(LogLevel::Trace < LogLevel::Error);
    }
}
