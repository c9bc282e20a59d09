//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sign in to campus mail and learning services from the terminal.
///
/// Obtains OAuth2 tokens through the device-code flow, keeps them fresh,
/// and recovers the learning platform's mobile token through single sign-on.
#[derive(Parser, Debug)]
#[command(name = "campus-auth")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage stored mail credentials.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Recover the learning platform token through single sign-on.
    ///
    /// Prints only the token on stdout.
    Sso {
        /// Institutional username (email address).
        #[arg(short, long, env = "M365_USERNAME")]
        username: String,

        /// Institutional password.
        #[arg(short, long, env = "M365_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

/// Authentication subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Log in with the OAuth2 device-code flow.
    Login {
        /// Account (email address) to store the tokens under.
        #[arg(short, long)]
        account: String,

        /// Skip opening the browser automatically.
        #[arg(long)]
        no_browser: bool,
    },

    /// Store a password for an account.
    ///
    /// Reads CAMPUS_AUTH_PASSWORD, or one line from stdin.
    Password {
        /// Account to store the password under.
        #[arg(short, long)]
        account: String,
    },

    /// Print a valid access token, refreshing it if needed.
    Token {
        /// Account whose token to print.
        #[arg(short, long)]
        account: String,
    },

    /// Show stored credentials.
    Status {
        /// Only show this account.
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Remove the stored credential for an account.
    Logout {
        /// Account to log out.
        #[arg(short, long)]
        account: String,
    },
}
