//! The credential pair and the cached identity that travels with it.

use serde::{Deserialize, Serialize};

use super::tokens::{AccessToken, RefreshToken};

/// Cached descriptor of the signed-in user.
///
/// Kept for display purposes only; the server stays the source of truth for
/// what the user may do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub role: String,
    /// Any further display attributes the login endpoint returned.
    #[serde(default, flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl SessionIdentity {
    pub fn new(id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            role: role.into(),
            attributes: serde_json::Map::new(),
        }
    }
}

/// The current session: both tokens and the identity, always together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub identity: SessionIdentity,
}

impl CredentialPair {
    pub fn new(
        access_token: AccessToken,
        refresh_token: RefreshToken,
        identity: SessionIdentity,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            identity,
        }
    }

    /// Returns a copy with a renewed access token and, if the server rotated
    /// it, a new refresh token. The identity is carried over unchanged.
    pub fn renewed(&self, access_token: AccessToken, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            access_token,
            refresh_token: refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
            identity: self.identity.clone(),
        }
    }
}
