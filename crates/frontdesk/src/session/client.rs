//! The session-aware API client.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::auth::{AccessToken, CredentialPair, LoginCredentials, RefreshToken, SessionIdentity};
use crate::config::ClientConfig;
use crate::error::{Error, SessionError};
use crate::pipeline::{ApiRequest, ApiResponse, Classification, RequestPipeline};
use crate::remote::{HttpSessionService, LoginResponse, SessionService};
use crate::store::CredentialStore;

use super::coordinator::RefreshCoordinator;
use super::events::{SessionBroadcaster, SessionEvents};
use super::liveness::LivenessPoller;

/// An authenticated client for the administration API.
///
/// Every request goes out with the current access token. A request refused
/// with 401/403 is held while the session is renewed and then replayed
/// exactly once; concurrent refusals share a single renewal.
///
/// Cheap to clone; clones share the session.
///
/// ```no_run
/// use std::sync::Arc;
/// use frontdesk::{ApiUrl, ClientConfig, FileStore, LoginCredentials, SessionClient};
///
/// # async fn example() -> Result<(), frontdesk::Error> {
/// let config = ClientConfig::new(ApiUrl::new("https://admin.example.com")?);
/// let store = Arc::new(FileStore::new("/tmp/frontdesk-session.json"));
/// let client = SessionClient::new(config, store)?;
///
/// let me = client
///     .login(&LoginCredentials::new("manager@example.com", "secret"))
///     .await?;
/// println!("signed in as {} ({})", me.id, me.role);
///
/// let hotels: serde_json::Value = client.get_json("/api/hotels").await?;
/// println!("{hotels}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    service: Arc<dyn SessionService>,
    pipeline: RequestPipeline,
    coordinator: RefreshCoordinator,
    events: SessionBroadcaster,
}

impl SessionClient {
    /// Create a client talking to the session endpoints over HTTP.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let service = Arc::new(HttpSessionService::new(&config)?);
        Self::with_service(config, store, service)
    }

    /// Create a client with a custom session service.
    pub fn with_service(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        service: Arc<dyn SessionService>,
    ) -> Result<Self> {
        let pipeline = RequestPipeline::new(&config, store.clone())?;
        let events = SessionBroadcaster::new(config.event_capacity);
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            service.clone(),
            events.clone(),
            config.exchange_timeout(),
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                store,
                service,
                pipeline,
                coordinator,
                events,
            }),
        })
    }

    /// Sign in and store the issued credential pair.
    ///
    /// # Errors
    ///
    /// `SessionError::LoginRejected` if the API refused the credentials.
    #[instrument(skip(self, credentials), fields(email = credentials.email()))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<SessionIdentity> {
        let request = ApiRequest::post(self.inner.config.auth.login.as_str())
            .json(credentials)?
            .exempt();

        let response = match self.inner.pipeline.dispatch(&request).await.result {
            Ok(response) => response,
            Err(Error::Api(err)) if err.status == 400 || err.is_auth_failure() => {
                warn!(status = err.status, "Login rejected");
                return Err(SessionError::LoginRejected(err).into());
            }
            Err(e) => return Err(e),
        };

        let body: LoginResponse = response.json()?;
        let pair = CredentialPair::new(
            AccessToken::new(body.access_token),
            RefreshToken::new(body.refresh_token),
            body.user,
        );
        let identity = pair.identity.clone();

        self.inner.coordinator.begin(pair).await?;
        info!(user = %identity.id, role = %identity.role, "Signed in");
        Ok(identity)
    }

    /// Sign out: clear the local session, then revoke the refresh token.
    ///
    /// Returns true if a session was signed out. A failed revocation is
    /// logged and otherwise ignored; the local session is gone either way.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<bool> {
        let Some(pair) = self.inner.coordinator.end().await? else {
            debug!("Not signed in");
            return Ok(false);
        };

        if let Err(e) = self.inner.service.revoke(&pair.refresh_token).await {
            warn!(error = %e, "Could not revoke refresh token");
        }

        info!(user = %pair.identity.id, "Signed out");
        Ok(true)
    }

    /// The cached identity of the signed-in user.
    pub async fn current_identity(&self) -> Result<Option<SessionIdentity>> {
        Ok(self.inner.store.get().await?.map(|pair| pair.identity))
    }

    pub async fn is_signed_in(&self) -> Result<bool> {
        Ok(self.inner.store.get().await?.is_some())
    }

    /// Send a request, renewing the session and replaying once if the access
    /// token is refused.
    ///
    /// # Errors
    ///
    /// - `SessionError::Ended` if the renewal failed. The session has been
    ///   torn down and observers told.
    /// - The replay's own error if it fails again, unchanged.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let attempt = self.inner.pipeline.dispatch(&request).await;

        match self.inner.pipeline.classify(&request, &attempt.result) {
            Classification::Settled => attempt.result,
            Classification::SessionExpired => {
                debug!("Access token refused; renewing session");
                self.inner
                    .coordinator
                    .renew(attempt.attached.as_ref())
                    .await?;
                self.inner
                    .pipeline
                    .dispatch(&request.into_replay())
                    .await
                    .result
            }
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::delete(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        self.execute(ApiRequest::patch(path).json(body)?).await
    }

    /// GET a path and decode the JSON body.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.get(path).await?.json()
    }

    /// Renew the session now, without waiting for a request to be refused.
    pub async fn refresh(&self) -> Result<AccessToken> {
        self.inner.coordinator.renew(None).await
    }

    /// Subscribe to session lifecycle events.
    pub fn events(&self) -> SessionEvents {
        self.inner.events.subscribe()
    }

    /// A liveness poller for this session, checking at the configured
    /// interval.
    pub fn liveness_poller(&self) -> LivenessPoller {
        LivenessPoller::new(
            self.inner.store.clone(),
            self.inner.service.clone(),
            self.inner.coordinator.clone(),
            self.inner.config.liveness_interval(),
        )
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.inner.config.base_url)
            .finish_non_exhaustive()
    }
}
