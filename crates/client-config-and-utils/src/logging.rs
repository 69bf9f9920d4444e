//! Logging initialization for the client.
//!
//! Thin wrapper over the `observability` crate so the binary has one entry
//! point and the log file lives under the configured base directory.

use crate::Paths;
use observability::LogConfig;

/// Initialize logging for the client.
///
/// `level` is the default filter; `RUST_LOG` takes precedence when set.
/// `also_stderr` mirrors events to stderr for interactive runs.
pub fn init_logging(level: &str, paths: &Paths, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: "lumen".into(),
        default_level: parse_level(level).to_string().to_ascii_lowercase(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
