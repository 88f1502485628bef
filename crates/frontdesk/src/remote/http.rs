//! HTTP implementation of the session service.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument, trace};

use crate::Result;
use crate::auth::{AccessToken, RefreshToken};
use crate::config::{AuthPaths, ClientConfig};
use crate::error::{ApiError, Error};
use crate::types::ApiUrl;

use super::endpoints::{CheckResponse, ErrorBody, RefreshResponse, RefreshTokenBody};
use super::{ExchangeOutcome, Liveness, RenewedTokens, SessionService};

/// Session service reached over the API's `/api/auth/*` endpoints.
///
/// Uses its own HTTP client: session calls never go through the request
/// pipeline, so they can never recurse into a refresh.
#[derive(Debug, Clone)]
pub struct HttpSessionService {
    client: reqwest::Client,
    base_url: ApiUrl,
    paths: AuthPaths,
}

impl HttpSessionService {
    /// Create a service for the configured API.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("frontdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            paths: config.auth.clone(),
        })
    }

    async fn post(&self, path: &str, refresh_token: &RefreshToken) -> Result<reqwest::Response> {
        let url = self.base_url.endpoint_url(path);
        debug!(%url, "session service call");

        let response = self
            .client
            .post(&url)
            .json(&RefreshTokenBody {
                refresh_token: refresh_token.as_str(),
            })
            .send()
            .await?;

        trace!(status = %response.status(), "session service response");
        Ok(response)
    }
}

/// Parse an error response into an [`ApiError`].
pub(crate) async fn api_error(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    ApiError::new(status, body.error, body.message)
}

fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

#[async_trait]
impl SessionService for HttpSessionService {
    #[instrument(skip(self, refresh_token))]
    async fn exchange(&self, refresh_token: &RefreshToken) -> Result<ExchangeOutcome> {
        let response = self.post(&self.paths.refresh, refresh_token).await?;
        let status = response.status();

        if status.is_success() {
            let body: RefreshResponse = response.json().await?;
            return Ok(ExchangeOutcome::Renewed(RenewedTokens {
                access_token: AccessToken::new(body.access_token),
                refresh_token: body.refresh_token.map(RefreshToken::new),
            }));
        }

        if is_rejection(status) {
            debug!(%status, "refresh token rejected");
            return Ok(ExchangeOutcome::Rejected);
        }

        Err(Error::Api(api_error(response).await))
    }

    #[instrument(skip(self, refresh_token))]
    async fn check(&self, refresh_token: &RefreshToken) -> Result<Liveness> {
        let response = self.post(&self.paths.check, refresh_token).await?;
        let status = response.status();

        if status.is_success() {
            let body: CheckResponse = response.json().await?;
            return Ok(if body.valid {
                Liveness::Valid
            } else {
                Liveness::Invalid
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(Liveness::Invalid);
        }

        Err(Error::Api(api_error(response).await))
    }

    #[instrument(skip(self, refresh_token))]
    async fn revoke(&self, refresh_token: &RefreshToken) -> Result<()> {
        let response = self.post(&self.paths.logout, refresh_token).await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Api(api_error(response).await))
        }
    }
}
