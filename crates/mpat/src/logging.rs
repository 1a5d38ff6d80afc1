//! Logging setup
//!
//! One subscriber for the whole process, writing to stderr.

use anyhow::Result;
use mpat_config::{LogConfig, LogFormat, LogLevel, debug_enabled};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Resolve log level: CLI flag > MPAT_DEBUG > config file > default "info"
///
/// A flag naming a plain level is normalized ("WARNING" becomes "warn"); any
/// other flag value is passed through as a filter directive.
pub fn resolve_log_level(cli_level: Option<&str>, debug_env: Option<&str>, config: &LogConfig) -> String {
    if let Some(level) = cli_level {
        return match level.parse::<LogLevel>() {
            Ok(level) => level.as_str().to_string(),
            Err(_) => level.to_string(),
        };
    }

    if debug_env.is_some_and(debug_enabled) {
        return "debug".to_string();
    }

    config.level.as_str().to_string()
}

/// Initialize the tracing subscriber for logging
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let (console, json) = match format {
        LogFormat::Console => (
            Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(json)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_level(level: LogLevel) -> LogConfig {
        LogConfig {
            level,
            ..LogConfig::default()
        }
    }

    #[test]
    fn test_flag_wins() {
        let level = resolve_log_level(Some("mpat_jobs=trace"), Some("1"), &file_level(LogLevel::Warn));
        assert_eq!(level, "mpat_jobs=trace");
    }

    #[test]
    fn test_flag_level_names_are_normalized() {
        let config = file_level(LogLevel::Error);
        assert_eq!(resolve_log_level(Some("WARNING"), None, &config), "warn");
        assert_eq!(resolve_log_level(Some("Debug"), Some("0"), &config), "debug");
        assert_eq!(resolve_log_level(Some("loud"), None, &config), "loud");
    }

    #[test]
    fn test_debug_env_beats_file() {
        assert_eq!(resolve_log_level(None, Some("1"), &file_level(LogLevel::Warn)), "debug");
        assert_eq!(resolve_log_level(None, Some("0"), &file_level(LogLevel::Warn)), "warn");
    }

    #[test]
    fn test_defaults_to_info() {
        assert_eq!(resolve_log_level(None, None, &LogConfig::default()), "info");
    }
}
