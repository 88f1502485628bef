//! Session lifecycle events.
//!
//! The coordinator publishes here; any number of observers (one per open
//! view of the session) subscribe. Publishing never waits for observers and
//! a slow or vanished observer never affects the coordinator.

use futures_util::Stream;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::auth::AccessToken;
use crate::error::TerminalReason;

/// Why observers must drop the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutCause {
    /// The session could not be renewed.
    Expired,
    /// The server revoked the refresh token.
    Revoked,
    /// The user signed out.
    SignedOut,
}

impl From<&TerminalReason> for LogoutCause {
    fn from(reason: &TerminalReason) -> Self {
        match reason {
            TerminalReason::Revoked => LogoutCause::Revoked,
            TerminalReason::SignedOut => LogoutCause::SignedOut,
            TerminalReason::RefreshRejected
            | TerminalReason::RefreshUnreachable { .. }
            | TerminalReason::NoRefreshToken
            | TerminalReason::StoreFailure { .. } => LogoutCause::Expired,
        }
    }
}

/// An event observers of the session react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new access token was stored.
    Renewed { access_token: AccessToken },
    /// The session is over; observers must show the sign-in screen.
    LogoutRequired { cause: LogoutCause },
}

/// Process-wide publish point for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionBroadcaster {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of observers it reached.
    pub fn publish(&self, event: SessionEvent) -> usize {
        trace!(?event, "publishing session event");
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> SessionEvents {
        SessionEvents {
            rx: self.tx.subscribe(),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// An observer's view of the event stream.
#[derive(Debug)]
pub struct SessionEvents {
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionEvents {
    /// Wait for the next event. Returns `None` once every publisher is gone.
    ///
    /// An observer that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session observer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "session observer lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Turn the observer into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = SessionEvent> + Send {
        futures_util::stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }
}
