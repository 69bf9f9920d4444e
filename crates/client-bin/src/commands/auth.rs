//! Authentication commands.

use super::{prompt_line, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_state_store::{RegistrationForm, SessionState};

/// Reconcile with the server and print the session state.
pub async fn status(ctx: &Context) -> Result<()> {
    let store = ctx.checked_store().await?;
    let state = store.snapshot();
    let site = store.server_config().and_then(|config| config.site_name);

    match ctx.format {
        OutputFormat::Text => {
            output::print_row("Server", &ctx.server_url()?);
            if let Some(site) = &site {
                output::print_row("Site", site);
            }
            print_state(&state);
        }
        OutputFormat::Json => output::print_json(&serde_json::json!({
            "server": ctx.server_url()?,
            "site_name": site,
            "session": state,
        })),
    }
    Ok(())
}

fn print_state(state: &SessionState) {
    output::print_row("Logged in", if state.is_logged_in { "yes" } else { "no" });
    if let Some(user) = &state.current_user {
        output::print_row("User", &user.name);
        if let Some(role) = &user.role {
            output::print_row("Role", role);
        }
        if let Some(external) = &user.external_username {
            output::print_row("Linked account", external);
        }
    }
}

/// Login with username and password.
pub async fn login(ctx: &Context) -> Result<()> {
    let store = ctx.checked_store().await?;

    if store.snapshot().is_logged_in {
        output::print_success("Already logged in", &ctx.format);
        return Ok(());
    }

    let username = prompt_line("Username: ")?;
    if username.is_empty() {
        output::print_error("Username is required", &ctx.format);
        return Ok(());
    }
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", &ctx.format);
        return Ok(());
    }

    if !store.login(&username, &password).await {
        anyhow::bail!("Login failed");
    }
    Ok(())
}

/// Logout and clear the local cookie jar.
pub async fn logout(ctx: &Context) -> Result<()> {
    let store = ctx.store()?;
    if let Ok(server) = ctx.server_url() {
        store.set_endpoint(&server)?;
    }
    store.logout().await;
    Ok(())
}

/// Create an account.
pub async fn register(ctx: &Context) -> Result<()> {
    let server = ctx.server_url()?;
    let store = ctx.store()?;
    store.set_endpoint(&server)?;

    let username = prompt_line("Username: ")?;
    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;

    let form = RegistrationForm::new(&username, &password, &confirm);
    if let Err(e) = form.validate() {
        output::print_error(&e.to_string(), &ctx.format);
        return Ok(());
    }

    if !store.register(&username, &password, &confirm).await {
        anyhow::bail!("Registration failed");
    }
    Ok(())
}
