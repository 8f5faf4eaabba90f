//! Logging configuration and initialization
//!
//! Structured logging with tracing: compact console output for operators,
//! JSON for log aggregation, and an optional plain-text file for sessions
//! where the tracker needs to be debugged after the fact.

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Filter variable checked before `RUST_LOG`
pub const LOG_ENV: &str = "HEADTRACK_LOG";
/// Set to `json` to switch console output to JSON
pub const LOG_FORMAT_ENV: &str = "HEADTRACK_LOG_FORMAT";

const DEFAULT_LOG_FILE: &str = "headtrack.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Enable file logging (default: false)
    pub file_enabled: bool,
    /// Log file path (default: `headtrack.log` in the working directory)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for console logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Also write logs to `path`
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_enabled = true;
        self.file_path = Some(path.into());
        self
    }

    /// Path the file layer writes to
    pub fn resolved_file_path(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }

    /// JSON output requested by config or `HEADTRACK_LOG_FORMAT`
    fn use_json(&self) -> bool {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(self.json_format)
    }
}

/// Errors setting up logging
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// so the file writer is flushed.
///
/// # Environment Variables
///
/// - `HEADTRACK_LOG`: log filter (e.g. "debug", "info,immersive_headtrack::tracking=trace")
/// - `HEADTRACK_LOG_FORMAT`: set to "json" for JSON output
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LogError> {
    // HEADTRACK_LOG first, then RUST_LOG, then the configured default
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = config.use_json();
    let mut file_guard: Option<WorkerGuard> = None;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if config.file_enabled {
        let log_path = config.resolved_file_path();
        let file = std::fs::File::create(&log_path).map_err(|source| LogError::File {
            path: log_path.clone(),
            source,
        })?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .with_ansi(false);

        if config.console_enabled {
            let console_layer = fmt::layer().with_target(false).compact();
            subscriber.with(file_layer).with(console_layer).try_init()?;
        } else {
            subscriber.with(file_layer).try_init()?;
        }

        eprintln!("Logging to file: {}", log_path.display());
    } else if config.console_enabled {
        if use_json {
            let json_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_current_span(false);

            subscriber.with(json_layer).try_init()?;
        } else {
            let console_layer = fmt::layer().with_target(false).compact();
            subscriber.with(console_layer).try_init()?;
        }
    } else {
        subscriber.try_init()?;
    }

    tracing::info!(
        target: "immersive_headtrack",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert!(config.console_enabled);
        assert!(!config.file_enabled);
        assert!(!config.json_format);
        assert_eq!(config.default_level, "info");
        assert_eq!(config.resolved_file_path(), PathBuf::from("headtrack.log"));
    }

    #[test]
    fn test_with_file_enables_file_layer() {
        let config = LogConfig::default().with_file("/tmp/session.log");
        assert!(config.file_enabled);
        assert_eq!(config.resolved_file_path(), PathBuf::from("/tmp/session.log"));
    }
}
