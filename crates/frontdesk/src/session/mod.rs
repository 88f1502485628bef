//! Session lifecycle: renewal, sign-out, observers and liveness.
//!
//! [`SessionClient`] is the entry point. It owns one [`RefreshCoordinator`],
//! the single writer of the credential store, and one
//! [`SessionBroadcaster`] that every open view subscribes to.

mod client;
mod coordinator;
mod events;
mod liveness;

pub use client::SessionClient;
pub use coordinator::RefreshCoordinator;
pub use events::{LogoutCause, SessionBroadcaster, SessionEvent, SessionEvents};
pub use liveness::{LivenessPoller, LivenessReport};
