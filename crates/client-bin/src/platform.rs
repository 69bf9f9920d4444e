//! Terminal implementations of the store's UI collaborators.

use crate::output::{self, OutputFormat};
use async_trait::async_trait;
use session_state_store::{ExternalBrowserOpener, Notice, NoticeLevel, Notifier};
use tracing::debug;

/// Prints notices as they arrive.
pub struct ConsoleNotifier {
    format: OutputFormat,
}

impl ConsoleNotifier {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => output::print_success(&notice.message, &self.format),
            NoticeLevel::Info => output::print_info(&notice.message, &self.format),
            NoticeLevel::Error => output::print_error(&notice.message, &self.format),
        }
    }
}

/// Opens URLs with the desktop's default handler.
pub struct SystemBrowserOpener;

#[async_trait]
impl ExternalBrowserOpener for SystemBrowserOpener {
    fn can_open(&self) -> bool {
        // Headless sessions have nothing to open a browser on.
        !cfg!(target_os = "linux")
            || std::env::var_os("DISPLAY").is_some()
            || std::env::var_os("WAYLAND_DISPLAY").is_some()
    }

    async fn open(&self, url: &str) -> std::io::Result<()> {
        let url = url.to_string();
        debug!("Opening authorization link in browser");
        tokio::task::spawn_blocking(move || open::that(url))
            .await
            .map_err(std::io::Error::other)?
    }
}
