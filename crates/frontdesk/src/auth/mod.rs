//! Credential types.
//!
//! A signed-in session is represented by a [`CredentialPair`]: the short-lived
//! [`AccessToken`], the longer-lived [`RefreshToken`] and the cached
//! [`SessionIdentity`] of the signed-in user.

mod credentials;
mod pair;
mod tokens;

pub use credentials::LoginCredentials;
pub use pair::{CredentialPair, SessionIdentity};
pub use tokens::{AccessToken, RefreshToken};
