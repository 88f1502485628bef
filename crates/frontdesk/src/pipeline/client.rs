//! Request decoration and failure classification.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use tracing::{debug, instrument, trace};

use crate::Result;
use crate::auth::AccessToken;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::remote::api_error;
use crate::store::CredentialStore;
use crate::types::{ApiUrl, ExemptEndpoints};

use super::request::{Access, ApiRequest, ApiResponse};

/// One pass of a request through the pipeline.
#[derive(Debug)]
pub struct Attempt {
    /// The access token attached to the request, if any.
    pub attached: Option<AccessToken>,
    pub result: Result<ApiResponse>,
}

/// What a finished attempt means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Hand the result to the caller as is.
    Settled,
    /// The access token was refused; renew the session and replay once.
    SessionExpired,
}

/// HTTP client that attaches the session's access token to outgoing requests.
#[derive(Clone)]
pub struct RequestPipeline {
    client: reqwest::Client,
    base_url: ApiUrl,
    exempt: ExemptEndpoints,
    store: Arc<dyn CredentialStore>,
}

impl RequestPipeline {
    /// Create a pipeline reading tokens from `store`.
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("frontdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            exempt: config.exempt.clone(),
            store,
        })
    }

    /// Returns true if the request must go out without a token and must never
    /// trigger a renewal.
    pub fn is_exempt(&self, request: &ApiRequest) -> bool {
        request.access() == Access::Exempt || self.exempt.is_exempt(request.path())
    }

    /// Send a request once.
    ///
    /// Non-exempt requests get `Authorization: Bearer <access token>` from the
    /// current credential pair. With no stored pair the request goes out
    /// unauthenticated and the server decides.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path(), retried = request.is_retried()))]
    pub async fn dispatch(&self, request: &ApiRequest) -> Attempt {
        let attached = if self.is_exempt(request) {
            None
        } else {
            match self.store.get().await {
                Ok(pair) => pair.map(|p| p.access_token),
                Err(e) => {
                    return Attempt {
                        attached: None,
                        result: Err(e),
                    };
                }
            }
        };

        let result = self.send(request, attached.as_ref()).await;
        Attempt { attached, result }
    }

    async fn send(&self, request: &ApiRequest, token: Option<&AccessToken>) -> Result<ApiResponse> {
        let url = self.base_url.endpoint_url(request.path());
        debug!(%url, authenticated = token.is_some(), "API request");

        let mut builder = self.client.request(request.method().clone(), &url);

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token.bearer_header()?);
        }

        let response = builder.send().await?;
        let status = response.status();
        trace!(%status, "API response");

        if status.is_success() {
            ApiResponse::read(response).await
        } else {
            Err(Error::Api(api_error(response).await))
        }
    }

    /// Decide whether a failed attempt means the session expired.
    ///
    /// Only a 401/403 on a non-exempt request that has not been replayed yet
    /// qualifies. Everything else is settled.
    pub fn classify(&self, request: &ApiRequest, result: &Result<ApiResponse>) -> Classification {
        match result {
            Err(Error::Api(err))
                if err.is_auth_failure() && !self.is_exempt(request) && !request.is_retried() =>
            {
                Classification::SessionExpired
            }
            _ => Classification::Settled,
        }
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base_url", &self.base_url)
            .field("exempt", &self.exempt)
            .finish_non_exhaustive()
    }
}
