//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// URL scheme the OS routes back into the app after external authorization.
pub const DEFAULT_DEEP_LINK_SCHEME: &str = "lumen";

/// Identity provider host the authorization link must point at.
pub const DEFAULT_IDENTITY_PROVIDER_HOST: &str = "connect.linux.do";

/// Timing knobs for session confirmation.
///
/// Cookie propagation into the local store lags the browser by a
/// device-dependent amount, so confirmation is a bounded poll rather than a
/// single read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTimings {
    /// Cookie reads per `check_session`.
    pub cookie_poll_attempts: u32,
    /// Delay between cookie reads.
    pub cookie_poll_interval_ms: u64,
    /// Cookie reads after a successful token exchange.
    pub verification_attempts: u32,
    /// Delay between verification reads.
    pub verification_interval_ms: u64,
    /// How long `check_session` waits for an in-flight server-config load.
    pub config_wait_timeout_ms: u64,
    /// Poll interval while waiting for the server config.
    pub config_wait_interval_ms: u64,
    /// Deferral before a cold-launch URL is dispatched.
    pub cold_launch_delay_ms: u64,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            cookie_poll_attempts: 5,
            cookie_poll_interval_ms: 800,
            verification_attempts: 8,
            verification_interval_ms: 1000,
            config_wait_timeout_ms: 3000,
            config_wait_interval_ms: 100,
            cold_launch_delay_ms: 800,
        }
    }
}

impl SessionTimings {
    pub fn cookie_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cookie_poll_interval_ms)
    }

    pub fn verification_interval(&self) -> Duration {
        Duration::from_millis(self.verification_interval_ms)
    }

    pub fn config_wait_interval(&self) -> Duration {
        Duration::from_millis(self.config_wait_interval_ms)
    }

    /// Number of config-wait polls that fit in the timeout (at least one).
    pub fn config_wait_attempts(&self) -> u32 {
        let interval = self.config_wait_interval_ms.max(1);
        let attempts = self.config_wait_timeout_ms / interval;
        u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
    }

    pub fn cold_launch_delay(&self) -> Duration {
        Duration::from_millis(self.cold_launch_delay_ms)
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base address of the streaming server.
    #[serde(default)]
    pub server_url: Option<String>,
    /// App URL scheme used for OAuth deep links.
    #[serde(default = "default_deep_link_scheme")]
    pub deep_link_scheme: String,
    /// Hosts an authorization link may point at.
    #[serde(default = "default_identity_provider_hosts")]
    pub identity_provider_hosts: Vec<String>,
    /// Whether authorization links are handed to the system browser.
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    /// Session confirmation timings.
    #[serde(default)]
    pub session: SessionTimings,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_deep_link_scheme() -> String {
    DEFAULT_DEEP_LINK_SCHEME.to_string()
}

fn default_identity_provider_hosts() -> Vec<String> {
    vec![DEFAULT_IDENTITY_PROVIDER_HOST.to_string()]
}

fn default_open_browser() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server_url: None,
            deep_link_scheme: default_deep_link_scheme(),
            identity_provider_hosts: default_identity_provider_hosts(),
            open_browser: default_open_browser(),
            session: SessionTimings::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("LUMEN_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(server_url) = std::env::var("LUMEN_SERVER_URL") {
            let trimmed = server_url.trim();
            if !trimmed.is_empty() {
                self.server_url = Some(trimmed.to_string());
            }
        }
    }

    fn validate(&self) -> CoreResult<()> {
        let scheme = self.deep_link_scheme.trim();
        let valid_scheme = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(CoreError::Config(format!(
                "invalid deep link scheme: {:?}",
                self.deep_link_scheme
            )));
        }
        if self.identity_provider_hosts.is_empty() {
            return Err(CoreError::Config(
                "identity_provider_hosts must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the server URL as a parsed URL, if one is configured.
    pub fn server_url(&self) -> CoreResult<Option<Url>> {
        self.server_url
            .as_deref()
            .map(|raw| Url::parse(raw).map_err(CoreError::from))
            .transpose()
    }
}
