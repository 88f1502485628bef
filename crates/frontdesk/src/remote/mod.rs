//! The remote session service.
//!
//! Exchanges, checks and revokes refresh tokens. An `Err` from any of these
//! calls means the service could not be asked; an explicit answer from the
//! service is always carried in the `Ok` value.

mod endpoints;
mod http;

use async_trait::async_trait;

use crate::Result;
use crate::auth::{AccessToken, RefreshToken};

pub(crate) use endpoints::LoginResponse;
pub(crate) use http::api_error;
pub use http::HttpSessionService;

/// Tokens returned by a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewedTokens {
    pub access_token: AccessToken,
    /// Present only when the service rotates refresh tokens.
    pub refresh_token: Option<RefreshToken>,
}

/// The service's answer to an exchange request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Renewed(RenewedTokens),
    /// The refresh token is invalid, expired or revoked.
    Rejected,
}

/// The service's answer to a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Valid,
    Invalid,
}

/// Operations the session service offers on a refresh token.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Trade the refresh token for a new access token.
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<ExchangeOutcome>;

    /// Ask whether the refresh token is still valid server-side.
    async fn check(&self, refresh_token: &RefreshToken) -> Result<Liveness>;

    /// Invalidate the refresh token. Best effort.
    async fn revoke(&self, refresh_token: &RefreshToken) -> Result<()>;
}
