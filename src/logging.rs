//! Logger construction.
//!
//! Components never reach for a global logger on their own: each one holds
//! a [`Dispatch`] handed to it at construction (or captured from the
//! caller's current default) and emits its events through that.

use crate::config::LoggingConfig;
use crate::error::{MonitorError, Result};
use std::fs::{self, File};
use std::sync::Mutex;
use tracing::{Dispatch, Level};
use tracing_subscriber::EnvFilter;

/// The dispatcher currently in scope for the calling thread.
pub fn current_dispatch() -> Dispatch {
    tracing::dispatcher::get_default(Dispatch::clone)
}

/// Parse a level name; unknown names fall back to INFO.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build a dispatcher for `config` without installing it.
///
/// With a log file configured, the file is truncated and written without
/// ANSI colours; otherwise output goes to stderr. `RUST_LOG` overrides the
/// configured level.
pub fn build_dispatch(config: &LoggingConfig) -> Result<Dispatch> {
    let level = parse_level(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let dispatch = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = File::create(path)?;
            Dispatch::new(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .finish(),
            )
        }
        None => Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };

    Ok(dispatch)
}

/// Build a dispatcher for `config` and install it process-wide.
pub fn init(config: &LoggingConfig) -> Result<Dispatch> {
    let dispatch = build_dispatch(config)?;
    tracing::dispatcher::set_global_default(dispatch.clone())
        .map_err(|e| MonitorError::Logging(e.to_string()))?;

    tracing::info!(
        level = %config.level,
        file = ?config.file,
        "Logger initialized"
    );
    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level(" error "), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_file_dispatch_truncates_and_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("buslens.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale contents\n").unwrap();

        let config = LoggingConfig {
            level: "debug".to_string(),
            file: Some(path.clone()),
        };
        let dispatch = build_dispatch(&config).unwrap();
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::warn!(subject = "orders.new", "written to file");
        });

        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale contents"));
        assert!(contents.contains("written to file"));
        assert!(contents.contains("orders.new"));
    }
}
