//! External browser collaborator.

use async_trait::async_trait;

/// Opens URLs outside the app.
#[async_trait]
pub trait ExternalBrowserOpener: Send + Sync {
    /// Whether this platform can open URLs externally at all.
    fn can_open(&self) -> bool;

    /// Open `url` in the system browser.
    async fn open(&self, url: &str) -> std::io::Result<()>;
}
