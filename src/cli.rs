//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};

/// Completes identity-provider logins from the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "login-callback",
    version,
    after_help = login_callback::build_info::HELP_BUILD_METADATA
)]
pub struct Args {
    /// Path to config file (default: ./login-callback.toml or
    /// ~/.config/login-callback/config.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Handle one load of the login callback page.
    Complete {
        /// Redirect fragment from the callback URL, with or without `#`.
        #[arg(long = "fragment", value_name = "HASH")]
        fragment: Option<String>,

        /// Treat the page as embedded in a hidden frame (silent renewal).
        #[arg(long = "framed")]
        framed: bool,

        /// Treat the page as a popup opened by another window.
        #[arg(long = "opener")]
        opener: bool,

        /// Print navigation URLs without launching a browser.
        #[arg(long = "no-browser")]
        no_browser: bool,
    },
    /// Start interactive login (callback page without a fragment).
    Login {
        /// Print the authorization URL without launching a browser.
        #[arg(long = "no-browser")]
        no_browser: bool,
    },
    /// Show the stored session and service credentials.
    Status,
    /// Store one service credential issued by the token exchange.
    Store {
        /// Opaque credential payload.
        #[arg(long = "token")]
        token: String,

        /// Service root URL (default: configured `service.root_url`).
        #[arg(long = "root-url")]
        root_url: Option<String>,

        /// Credential lifetime in seconds.
        #[arg(long = "expires-in", default_value_t = 3600)]
        expires_in: i64,
    },
    /// Remove the stored session and every service credential.
    Logout,
}
