//! Refresh command implementation.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct RefreshArgs {}

pub async fn run(ctx: &Context, _args: RefreshArgs) -> Result<()> {
    let client = ctx.client()?;

    eprintln!("{}", "Refreshing session...".dimmed());

    client
        .refresh()
        .await
        .context("Failed to refresh session")?;

    output::success("Session refreshed successfully");
    if let Some(identity) = client.current_identity().await? {
        output::field("User", &identity.id);
    }

    Ok(())
}
