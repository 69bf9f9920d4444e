//! Lumen CLI - sign in to a Lumen streaming server from the terminal.

mod commands;
mod output;
mod platform;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};
use commands::Context;
use std::path::PathBuf;
use tracing::debug;

/// Lumen CLI - Manage your session on a Lumen server.
#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Lumen CLI for signing in and checking your session")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for config, cookies and logs (default ~/.lumen)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Server address, overriding the configured one
    #[arg(long, global = true, env = "LUMEN_SERVER_URL")]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the session against the server
    Status,

    /// Login with username and password
    Login,

    /// Logout and clear cookies
    Logout,

    /// Create an account
    Register,

    /// Sign in through the identity provider in a browser
    Oauth,

    /// Handle a deep link the app was launched with
    HandleLink {
        /// The lumen:// URL
        url: String,
    },

    /// Show or change configuration
    Config {
        /// Save this server address to the config file
        #[arg(long)]
        set_server: Option<String>,
    },
}

async fn run(cli: Cli, ctx: Context) -> anyhow::Result<()> {
    match cli.command {
        Commands::Status => commands::status(&ctx).await,
        Commands::Login => commands::login(&ctx).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Register => commands::register(&ctx).await,
        Commands::Oauth => commands::oauth(&ctx).await,
        Commands::HandleLink { url } => commands::handle_link(&ctx, &url).await,
        Commands::Config { set_server } => match set_server {
            Some(server) => commands::set_server(&ctx, &server),
            None => commands::show_config(&ctx),
        },
    }
}

fn load(cli: &Cli) -> anyhow::Result<(Paths, Config)> {
    let paths = match &cli.base_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(server) = &cli.server {
        config.server_url = Some(server.clone());
    }
    Ok((paths, config))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let (paths, config) = match load(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, &paths, false);
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    let format = cli.format;
    let ctx = Context::new(paths, config, format);
    if let Err(e) = run(cli, ctx).await {
        output::print_error(&e.to_string(), &format);
        std::process::exit(1);
    }
}
