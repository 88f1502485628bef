//! frontdesk - session-aware client for the hotel administration API
//!
//! Holds the signed-in user's credential pair, attaches the access token to
//! every request, and renews the session transparently when the API refuses
//! the token. All authenticated calls flow through a [`SessionClient`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use frontdesk::{ApiUrl, ClientConfig, LoginCredentials, MemoryStore, SessionClient, SessionEvent};
//!
//! # async fn example() -> Result<(), frontdesk::Error> {
//! let config = ClientConfig::new(ApiUrl::new("https://admin.example.com")?);
//! let client = SessionClient::new(config, Arc::new(MemoryStore::new()))?;
//!
//! let mut events = client.events();
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         if let SessionEvent::LogoutRequired { cause } = event {
//!             println!("signed out: {cause:?}");
//!         }
//!     }
//! });
//!
//! client
//!     .login(&LoginCredentials::new("manager@example.com", "secret"))
//!     .await?;
//! let rooms = client.get("/api/hotels/7/rooms").await?;
//! println!("{}", rooms.text());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod session;
pub mod store;
pub mod types;

// Re-export primary types at crate root for convenience
pub use auth::{AccessToken, CredentialPair, LoginCredentials, RefreshToken, SessionIdentity};
pub use config::{AuthPaths, ClientConfig};
pub use error::Error;
pub use pipeline::{ApiRequest, ApiResponse};
pub use remote::{HttpSessionService, SessionService};
pub use session::{
    LivenessPoller, LivenessReport, LogoutCause, RefreshCoordinator, SessionBroadcaster,
    SessionClient, SessionEvent, SessionEvents,
};
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use types::{ApiUrl, EndpointPattern, ExemptEndpoints};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
