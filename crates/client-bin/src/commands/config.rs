//! Configuration commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// Show the effective configuration.
pub fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    match ctx.format {
        OutputFormat::Text => {
            output::print_row("Config file", &ctx.paths.config_file().display().to_string());
            output::print_row("Cookie jar", &ctx.paths.cookie_file().display().to_string());
            output::print_row("Log file", &ctx.paths.log_file().display().to_string());
            output::print_row("Server", config.server_url.as_deref().unwrap_or("(not set)"));
            output::print_row("Log level", &config.log_level);
            output::print_row("Link scheme", &config.deep_link_scheme);
            output::print_row("Providers", &config.identity_provider_hosts.join(", "));
            output::print_row("Open browser", &config.open_browser.to_string());
        }
        OutputFormat::Json => output::print_json(config),
    }
    Ok(())
}

/// Persist a server address so later commands can omit `--server`.
pub fn set_server(ctx: &Context, server: &str) -> Result<()> {
    let mut config = ctx.config.clone();
    config.server_url = Some(server.trim().to_string());
    if config.server_url()?.is_none() {
        anyhow::bail!("Server address is empty");
    }
    config.save(&ctx.paths)?;
    output::print_success(&format!("Server set to {}", server.trim()), &ctx.format);
    Ok(())
}
