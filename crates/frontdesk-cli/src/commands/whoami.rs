//! Whoami command implementation.

use anyhow::{Context as _, Result};
use clap::Args;

use frontdesk::CredentialStore;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the identity as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &Context, args: WhoamiArgs) -> Result<()> {
    let pair = ctx
        .store()
        .get()
        .await
        .context("Failed to load session")?
        .context("No active session. Run 'frontdesk login' first.")?;

    if args.json {
        output::json_pretty(&pair.identity)?;
    } else {
        output::identity(&pair.identity);
    }

    Ok(())
}
