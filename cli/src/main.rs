//! campus-auth - command-line sign-in for campus services
//!
//! Keeps OAuth2 mail credentials per account, renews them as they expire,
//! and recovers the learning platform's mobile token through SAML2 single
//! sign-on without a browser.

mod auth;
mod cli;
mod config;
mod error;
mod retry;
mod sso;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{AuthCommands, Cli, Commands};
use crate::config::settings::env;
use crate::config::{load_config, load_config_from};
use crate::error::Result;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for tokens
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(env::LOG_LEVEL)
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Run the command
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(if e.requires_reauth() { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::Login {
                account,
                no_browser,
            } => cli::commands::handle_login(&config, &account, no_browser).await,
            AuthCommands::Password { account } => {
                cli::commands::handle_password(&config, &account)
            }
            AuthCommands::Token { account } => {
                cli::commands::handle_token(&config, &account).await
            }
            AuthCommands::Status { account } => {
                cli::commands::handle_status(&config, account.as_deref())
            }
            AuthCommands::Logout { account } => cli::commands::handle_logout(&config, &account),
        },
        Commands::Sso { username, password } => {
            cli::commands::handle_sso(&config, &username, &password).await
        }
    }
}
