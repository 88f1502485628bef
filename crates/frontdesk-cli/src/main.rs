//! frontdesk - operator CLI for the hotel administration API.
//!
//! This is a thin wrapper over the `frontdesk` library, intended for manual
//! exploration of the API and debugging of session renewal.

mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.json_logs);

    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Commands::Login(args) => commands::login::run(&ctx, args).await,
        Commands::Whoami(args) => commands::whoami::run(&ctx, args).await,
        Commands::Request(args) => commands::request::run(&ctx, args).await,
        Commands::Refresh(args) => commands::refresh::run(&ctx, args).await,
        Commands::Check(args) => commands::check::run(&ctx, args).await,
        Commands::Watch(args) => commands::watch::run(&ctx, args).await,
        Commands::Logout(args) => commands::logout::run(&ctx, args).await,
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so command output stays parseable
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
