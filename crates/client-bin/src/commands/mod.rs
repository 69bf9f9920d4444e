//! CLI command implementations.

mod auth;
mod config;
mod oauth;

pub use auth::{login, logout, register, status};
pub use config::{set_server, show_config};
pub use oauth::{handle_link, oauth};

use crate::output::OutputFormat;
use crate::platform::{ConsoleNotifier, SystemBrowserOpener};
use anyhow::{Context as _, Result};
use client_config_and_utils::{Config, Paths};
use cookie_storage::FileCookieStore;
use server_api_client::ReqwestAuthApiClient;
use session_state_store::{SessionStateStore, StoreSettings};
use std::io::{self, Write};
use std::sync::Arc;

/// Everything a command needs.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(paths: Paths, config: Config, format: OutputFormat) -> Self {
        Self {
            paths,
            config,
            format,
        }
    }

    /// Build a session store backed by the on-disk cookie jar.
    pub fn store(&self) -> Result<Arc<SessionStateStore>> {
        let cookies = Arc::new(
            FileCookieStore::open(self.paths.cookie_file())
                .context("Failed to open cookie store")?,
        );
        let api = Arc::new(
            ReqwestAuthApiClient::new(cookies.clone()).context("Failed to build HTTP client")?,
        );
        Ok(Arc::new(SessionStateStore::new(
            api,
            cookies,
            Arc::new(ConsoleNotifier::new(self.format)),
            Arc::new(SystemBrowserOpener),
            StoreSettings::from(&self.config),
        )))
    }

    /// Configured server address, or an error telling the user how to set one.
    pub fn server_url(&self) -> Result<String> {
        let url = self.config.server_url()?.ok_or_else(|| {
            anyhow::anyhow!("No server configured. Pass --server or set LUMEN_SERVER_URL")
        })?;
        Ok(url.to_string())
    }

    /// Store with the session already reconciled against the server.
    pub async fn checked_store(&self) -> Result<Arc<SessionStateStore>> {
        let server = self.server_url()?;
        let store = self.store()?;
        store.check_session(Some(&server)).await;
        Ok(store)
    }
}

/// Read one trimmed line from stdin after printing `prompt`.
fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
