//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{check, login, logout, refresh, request, watch, whoami};

/// Operator CLI for the hotel administration API.
#[derive(Parser, Debug)]
#[command(name = "frontdesk")]
#[command(author, version = env!("FRONTDESK_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// API base URL
    #[arg(long, env = "FRONTDESK_API", global = true)]
    pub api: Option<String>,

    /// JSON client configuration file (overridden by --api)
    #[arg(long, env = "FRONTDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Credential file (defaults to the user data directory)
    #[arg(long, env = "FRONTDESK_STORE", global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login(login::LoginArgs),

    /// Display the signed-in user
    Whoami(whoami::WhoamiArgs),

    /// Send a request through the session client
    Request(request::RequestArgs),

    /// Renew the session now
    Refresh(refresh::RefreshArgs),

    /// Ask the server whether the session is still valid
    Check(check::CheckArgs),

    /// Watch the session, checking liveness periodically
    Watch(watch::WatchArgs),

    /// Sign out and revoke the session
    Logout(logout::LogoutArgs),
}
