//! Check command implementation.

use anyhow::{Result, bail};
use clap::Args;

use frontdesk::LivenessReport;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct CheckArgs {}

pub async fn run(ctx: &Context, _args: CheckArgs) -> Result<()> {
    let client = ctx.client()?;

    match client.liveness_poller().poll_once().await {
        LivenessReport::Valid => output::success("Session is valid"),
        LivenessReport::Deferred => output::warning("Session changed during the check"),
        LivenessReport::Inconclusive => {
            output::warning("Could not reach the session service; session kept")
        }
        LivenessReport::Revoked => bail!("Session was revoked. Run 'frontdesk login' again."),
        LivenessReport::NoSession => bail!("No active session. Run 'frontdesk login' first."),
    }

    Ok(())
}
