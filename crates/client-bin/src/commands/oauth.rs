//! OAuth commands.
//!
//! A terminal cannot receive the `lumen://` deep link itself, so after the
//! browser step the user pastes the callback URL (or the OS launches
//! `lumen handle-link <url>`).

use super::{prompt_line, Context};
use crate::output;
use anyhow::Result;
use session_state_store::{AppEvent, AppEventDispatcher};
use tracing::debug;

/// Start an OAuth sign-in and wait for the callback URL on stdin.
pub async fn oauth(ctx: &Context) -> Result<()> {
    let store = ctx.checked_store().await?;

    if store.snapshot().is_logged_in {
        output::print_success("Already logged in", &ctx.format);
        return Ok(());
    }
    if !store.server_config().is_some_and(|config| config.oauth_enabled()) {
        debug!("Server config does not advertise OAuth; trying anyway");
    }

    if !store.begin_oauth().await {
        anyhow::bail!("Could not start authorization");
    }
    if let Some(link) = store.snapshot().pending_authorization_link {
        output::print_row("Open this link", &link);
    }

    let callback = prompt_line("Paste the callback URL (empty to cancel): ")?;
    if callback.is_empty() {
        store.cancel_oauth();
        output::print_info("Authorization cancelled", &ctx.format);
        return Ok(());
    }

    let dispatcher = AppEventDispatcher::new(store);
    match dispatcher.dispatch(AppEvent::DeepLink(callback)).await {
        Some(true) => Ok(()),
        Some(false) => anyhow::bail!("Authorization failed"),
        None => anyhow::bail!("That is not an authorization callback URL"),
    }
}

/// Entry point for URLs the OS launches the app with.
pub async fn handle_link(ctx: &Context, url: &str) -> Result<()> {
    let server = ctx.server_url()?;
    let store = ctx.store()?;
    store.set_endpoint(&server)?;

    let dispatcher = AppEventDispatcher::new(store);
    match dispatcher
        .dispatch(AppEvent::ColdLaunch(Some(url.to_string())))
        .await
    {
        Some(true) => Ok(()),
        Some(false) => anyhow::bail!("Authorization failed"),
        None => {
            output::print_info("Ignoring link that is not an authorization callback", &ctx.format);
            Ok(())
        }
    }
}
