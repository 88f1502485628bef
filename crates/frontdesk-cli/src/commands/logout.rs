//! Logout command implementation.

use anyhow::{Context as _, Result};
use clap::Args;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(ctx: &Context, _args: LogoutArgs) -> Result<()> {
    let client = ctx.client()?;

    if client.logout().await.context("Failed to logout")? {
        output::success("Logged out");
    } else {
        output::warning("No active session");
    }

    Ok(())
}
