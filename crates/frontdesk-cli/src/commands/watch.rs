//! Watch command implementation.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use frontdesk::SessionEvent;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between liveness checks (defaults to the configured interval)
    #[arg(long)]
    pub interval: Option<u64>,
}

pub async fn run(ctx: &Context, args: WatchArgs) -> Result<()> {
    let mut config = ctx.config()?;
    if let Some(secs) = args.interval {
        config.liveness_interval_secs = secs.max(1);
    }

    let client = ctx.client_with(config)?;
    if !client.is_signed_in().await? {
        bail!("No active session. Run 'frontdesk login' first.");
    }

    let mut events = client.events().into_stream().boxed();
    let poller = client.liveness_poller();

    eprintln!(
        "{}",
        format!("Checking session every {}s...", poller.interval().as_secs()).dimmed()
    );
    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());
    eprintln!();

    let cancel = CancellationToken::new();
    let handle = poller.spawn(cancel.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.next() => match event {
                Some(event) => {
                    output::event(&event);
                    if matches!(event, SessionEvent::LogoutRequired { .. }) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    cancel.cancel();
    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Liveness poller failed");
    }

    Ok(())
}
