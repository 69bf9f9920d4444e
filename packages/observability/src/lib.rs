//! # Observability
//!
//! Logging layer for the Lumen client.
//!
//! Crates in the workspace only emit `tracing` events. The binary calls
//! [`init`] or [`init_with_config`] once at startup, which installs:
//!
//! - a JSONL file layer at `~/.lumen/logs/client.jsonl` (append-only, one
//!   object per line, flushed per line)
//! - an optional compact stderr layer for interactive use
//!
//! Field values that look like session secrets (`token`, `cookie`,
//! `password` in the field name) are redacted before they reach the file.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("lumen");
//!     tracing::info!("ready");
//! }
//! ```

mod json_layer;
mod writer;

pub use json_layer::{JsonLayer, LogEntry, REDACTED};
pub use writer::{CentralLogWriter, WriterFactory};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name written into every log line (e.g. "lumen").
    pub service_name: String,

    /// Default filter when `RUST_LOG` is not set.
    pub default_level: String,

    /// Custom log file path. Defaults to `~/.lumen/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Default location of the JSONL log file.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lumen").join("logs").join("client.jsonl"))
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// If the log file cannot be opened, file logging is skipped and only the
/// stderr layer (when enabled) is installed. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init_with_config(config: LogConfig) {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let log_path = config.log_path.clone().or_else(default_log_path);
    let file_layer = log_path.as_ref().and_then(|path| {
        match CentralLogWriter::new(path) {
            Ok(writer) => Some(
                JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                    .with_filter(env_filter()),
            ),
            Err(e) => {
                eprintln!("observability: cannot open {}: {}", path.display(), e);
                None
            }
        }
    });

    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?log_path,
            "observability initialized"
        );
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};
