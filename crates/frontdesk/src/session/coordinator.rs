//! Single-flight session renewal.
//!
//! The coordinator is the only writer of the credential store. It owns two
//! pieces of state:
//!
//! - the phase: `Idle`, or `Refreshing` with the waiters parked on the one
//!   exchange in flight;
//! - the writer lock, which serializes every store mutation (login, renewal
//!   commit, teardown) so a renewal can never resurrect a session that was
//!   torn down while the exchange was in flight.
//!
//! The exchange itself runs on a spawned task. Callers only ever wait on a
//! oneshot, so a caller that is dropped mid-renewal cannot strand the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, instrument, warn};

use crate::Result;
use crate::auth::{AccessToken, CredentialPair, RefreshToken};
use crate::error::{SessionError, TerminalReason};
use crate::remote::{ExchangeOutcome, SessionService};
use crate::store::CredentialStore;

use super::events::{LogoutCause, SessionBroadcaster, SessionEvent};

/// How an exchange settled, as seen by every waiter.
#[derive(Debug, Clone)]
enum Settlement {
    Renewed(AccessToken),
    Ended(TerminalReason),
    /// The exchange task died without settling.
    Aborted,
}

enum Phase {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<Settlement>>,
    },
}

/// Coordinates session renewal across concurrent requests.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    store: Arc<dyn CredentialStore>,
    service: Arc<dyn SessionService>,
    events: SessionBroadcaster,
    exchange_timeout: Duration,
    phase: Mutex<Phase>,
    writer: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        service: Arc<dyn SessionService>,
        events: SessionBroadcaster,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                service,
                events,
                exchange_timeout,
                phase: Mutex::new(Phase::Idle),
                writer: Mutex::new(()),
            }),
        }
    }

    /// Returns true while an exchange is in flight.
    pub async fn is_refreshing(&self) -> bool {
        matches!(*self.inner.phase.lock().await, Phase::Refreshing { .. })
    }

    /// Store a freshly issued pair, replacing any current session.
    #[instrument(skip(self, pair), fields(user = %pair.identity.id))]
    pub async fn begin(&self, pair: CredentialPair) -> Result<()> {
        let _writer = self.inner.writer.lock().await;
        self.inner.store.set(pair).await?;
        info!("Session started");
        Ok(())
    }

    /// End the session on the user's request.
    ///
    /// Clears the store and tells observers. Returns the pair that was
    /// removed so its refresh token can be revoked server-side.
    #[instrument(skip(self))]
    pub async fn end(&self) -> Result<Option<CredentialPair>> {
        let _writer = self.inner.writer.lock().await;
        let pair = self.inner.store.get().await?;
        self.inner.store.clear().await?;

        if pair.is_some() {
            self.inner.events.publish(SessionEvent::LogoutRequired {
                cause: LogoutCause::SignedOut,
            });
            info!("Session ended by user");
        }

        Ok(pair)
    }

    /// Obtain a usable access token after `stale` was refused.
    ///
    /// Joins the exchange in flight or starts one. If `stale` is no longer
    /// the stored token, a renewal already happened after the request went
    /// out and the current token is returned straight away. Pass `None` to
    /// force an exchange.
    ///
    /// # Errors
    ///
    /// `SessionError::Ended` if the exchange failed and the session was torn
    /// down.
    #[instrument(skip(self, stale))]
    pub async fn renew(&self, stale: Option<&AccessToken>) -> Result<AccessToken> {
        let (tx, rx) = oneshot::channel();

        {
            let mut phase = self.inner.phase.lock().await;
            match &mut *phase {
                Phase::Refreshing { waiters } => {
                    debug!(waiters = waiters.len(), "Joining exchange in flight");
                    waiters.push(tx);
                }
                Phase::Idle => {
                    if let Some(stale) = stale
                        && let Ok(Some(current)) = self.inner.store.get().await
                        && current.access_token != *stale
                    {
                        debug!("Access token already renewed");
                        return Ok(current.access_token);
                    }

                    *phase = Phase::Refreshing { waiters: vec![tx] };
                    let coordinator = self.clone();
                    tokio::spawn(async move { coordinator.run_exchange().await });
                }
            }
        }

        match rx.await {
            Ok(Settlement::Renewed(token)) => Ok(token),
            Ok(Settlement::Ended(reason)) => Err(SessionError::Ended { reason }.into()),
            Ok(Settlement::Aborted) | Err(_) => Err(SessionError::Interrupted.into()),
        }
    }

    /// Tear the session down because the server revoked `checked`.
    ///
    /// Does nothing while an exchange is in flight (that exchange settles the
    /// session on its own) or when the stored refresh token is no longer
    /// `checked`. Returns true if the session was torn down.
    #[instrument(skip(self, checked))]
    pub async fn revoke_if_idle(&self, checked: &RefreshToken) -> bool {
        let phase = self.inner.phase.lock().await;
        if matches!(*phase, Phase::Refreshing { .. }) {
            debug!("Exchange in flight; leaving revocation to it");
            return false;
        }

        let _writer = self.inner.writer.lock().await;
        match self.inner.store.get().await {
            Ok(Some(current)) if current.refresh_token == *checked => {}
            Ok(_) => {
                debug!("Session changed since the check; ignoring");
                return false;
            }
            Err(e) => warn!(error = %e, "Could not read credentials before revocation"),
        }

        self.teardown(&TerminalReason::Revoked).await;
        drop(phase);
        true
    }

    async fn run_exchange(self) {
        // The phase returns to `Idle` even if the session service panics.
        let coordinator = self.clone();
        let settlement = match tokio::spawn(async move { coordinator.exchange().await }).await {
            Ok(settlement) => settlement,
            Err(e) => {
                error!(error = %e, "Refresh exchange task failed");
                Settlement::Aborted
            }
        };

        let waiters = {
            let mut phase = self.inner.phase.lock().await;
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Refreshing { waiters } => waiters,
                Phase::Idle => Vec::new(),
            }
        };

        debug!(waiters = waiters.len(), "Exchange settled");
        for waiter in waiters {
            let _ = waiter.send(settlement.clone());
        }
    }

    async fn exchange(&self) -> Settlement {
        let pair = match self.inner.store.get().await {
            Ok(Some(pair)) => pair,
            Ok(None) => return self.terminate(TerminalReason::NoRefreshToken).await,
            Err(e) => {
                return self
                    .terminate(TerminalReason::StoreFailure {
                        message: e.to_string(),
                    })
                    .await;
            }
        };

        info!(user = %pair.identity.id, "Refreshing session");

        let outcome = tokio::time::timeout(
            self.inner.exchange_timeout,
            self.inner.service.exchange(&pair.refresh_token),
        )
        .await;

        let renewed = match outcome {
            Ok(Ok(ExchangeOutcome::Renewed(renewed))) => renewed,
            Ok(Ok(ExchangeOutcome::Rejected)) => {
                warn!("Refresh token rejected by session service");
                return self.terminate(TerminalReason::RefreshRejected).await;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Session service unreachable during refresh");
                return self
                    .terminate(TerminalReason::RefreshUnreachable {
                        message: e.to_string(),
                    })
                    .await;
            }
            Err(_) => {
                let timeout_ms = self.inner.exchange_timeout.as_millis() as u64;
                warn!(timeout_ms, "Refresh exchange timed out");
                return self
                    .terminate(TerminalReason::RefreshUnreachable {
                        message: format!("timed out after {}ms", timeout_ms),
                    })
                    .await;
            }
        };

        let _writer = self.inner.writer.lock().await;

        match self.inner.store.get().await {
            Ok(Some(current)) if current.refresh_token == pair.refresh_token => {}
            Ok(Some(current)) => {
                debug!("Session replaced during exchange; discarding renewed tokens");
                return Settlement::Renewed(current.access_token);
            }
            Ok(None) => {
                debug!("Session ended during exchange; discarding renewed tokens");
                return Settlement::Ended(TerminalReason::SignedOut);
            }
            Err(e) => {
                let reason = TerminalReason::StoreFailure {
                    message: e.to_string(),
                };
                self.teardown(&reason).await;
                return Settlement::Ended(reason);
            }
        }

        let next = pair.renewed(renewed.access_token, renewed.refresh_token);
        let access_token = next.access_token.clone();

        if let Err(e) = self.inner.store.set(next).await {
            error!(error = %e, "Failed to store renewed credentials");
            let reason = TerminalReason::StoreFailure {
                message: e.to_string(),
            };
            self.teardown(&reason).await;
            return Settlement::Ended(reason);
        }

        self.inner.events.publish(SessionEvent::Renewed {
            access_token: access_token.clone(),
        });
        info!("Session refreshed");

        Settlement::Renewed(access_token)
    }

    async fn terminate(&self, reason: TerminalReason) -> Settlement {
        let _writer = self.inner.writer.lock().await;
        self.teardown(&reason).await;
        Settlement::Ended(reason)
    }

    /// Clear the store and tell observers. Caller holds the writer lock.
    async fn teardown(&self, reason: &TerminalReason) {
        let had_session = !matches!(self.inner.store.get().await, Ok(None));

        if let Err(e) = self.inner.store.clear().await {
            error!(error = %e, "Failed to clear credentials");
        }

        if had_session {
            self.inner.events.publish(SessionEvent::LogoutRequired {
                cause: LogoutCause::from(reason),
            });
            warn!(%reason, "Session ended");
        } else {
            debug!(%reason, "No session to end");
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("exchange_timeout", &self.inner.exchange_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionIdentity;
    use crate::error::{Error, TransportError};
    use crate::remote::{Liveness, RenewedTokens};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Session service whose exchange blocks until released.
    struct GatedService {
        exchanges: AtomicUsize,
        gate: Notify,
        answer: std::sync::Mutex<Option<Result<ExchangeOutcome>>>,
    }

    impl GatedService {
        fn new(answer: Result<ExchangeOutcome>) -> Arc<Self> {
            Arc::new(Self {
                exchanges: AtomicUsize::new(0),
                gate: Notify::new(),
                answer: std::sync::Mutex::new(Some(answer)),
            })
        }

        fn renewing(access: &str, refresh: Option<&str>) -> Arc<Self> {
            Self::new(Ok(ExchangeOutcome::Renewed(RenewedTokens {
                access_token: AccessToken::new(access),
                refresh_token: refresh.map(RefreshToken::new),
            })))
        }

        fn exchanges(&self) -> usize {
            self.exchanges.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionService for GatedService {
        async fn exchange(&self, _refresh_token: &RefreshToken) -> Result<ExchangeOutcome> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            self.answer
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(ExchangeOutcome::Rejected))
        }

        async fn check(&self, _refresh_token: &RefreshToken) -> Result<Liveness> {
            Ok(Liveness::Valid)
        }

        async fn revoke(&self, _refresh_token: &RefreshToken) -> Result<()> {
            Ok(())
        }
    }

    fn pair(access: &str) -> CredentialPair {
        CredentialPair::new(
            AccessToken::new(access),
            RefreshToken::new("r1"),
            SessionIdentity::new("u-1", "admin"),
        )
    }

    fn coordinator(
        store: Arc<MemoryStore>,
        service: Arc<GatedService>,
    ) -> (RefreshCoordinator, SessionBroadcaster) {
        let events = SessionBroadcaster::new(16);
        let coordinator =
            RefreshCoordinator::new(store, service, events.clone(), Duration::from_secs(10));
        (coordinator, events)
    }

    async fn wait_until_refreshing(coordinator: &RefreshCoordinator) {
        while !coordinator.is_refreshing().await {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn concurrent_renewals_share_one_exchange() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::renewing("t2", None);
        let (coordinator, events) = coordinator(store.clone(), service.clone());
        let mut observer = events.subscribe();

        let stale = AccessToken::new("t1");
        let mut handles = Vec::new();
        for _ in 0..10 {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            handles.push(tokio::spawn(async move {
                coordinator.renew(Some(&stale)).await
            }));
        }

        wait_until_refreshing(&coordinator).await;
        // Let every task park before the exchange settles.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        service.gate.notify_one();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(token.as_str(), "t2");
        }

        assert_eq!(service.exchanges(), 1);
        assert_eq!(
            store.get().await.unwrap().unwrap().access_token.as_str(),
            "t2"
        );
        assert_eq!(
            observer.try_recv(),
            Some(SessionEvent::Renewed {
                access_token: AccessToken::new("t2")
            })
        );
        assert_eq!(observer.try_recv(), None);
        assert!(!coordinator.is_refreshing().await);
    }

    #[tokio::test]
    async fn rejected_exchange_clears_store_and_logs_out_once() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::new(Ok(ExchangeOutcome::Rejected));
        let (coordinator, events) = coordinator(store.clone(), service.clone());
        let mut observer = events.subscribe();

        let stale = AccessToken::new("t1");
        let first = {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            tokio::spawn(async move { coordinator.renew(Some(&stale)).await })
        };
        wait_until_refreshing(&coordinator).await;
        let second = {
            let coordinator = coordinator.clone();
            let stale = stale.clone();
            tokio::spawn(async move { coordinator.renew(Some(&stale)).await })
        };
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        service.gate.notify_one();

        for handle in [first, second] {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(
                err,
                Error::Session(SessionError::Ended {
                    reason: TerminalReason::RefreshRejected
                })
            ));
        }

        assert_eq!(service.exchanges(), 1);
        assert!(store.get().await.unwrap().is_none());
        assert_eq!(
            observer.try_recv(),
            Some(SessionEvent::LogoutRequired {
                cause: LogoutCause::Expired
            })
        );
        assert_eq!(observer.try_recv(), None);
    }

    #[tokio::test]
    async fn unreachable_service_is_terminal() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::new(Err(Error::Transport(TransportError::Connection {
            message: "connection refused".to_string(),
        })));
        let (coordinator, _events) = coordinator(store.clone(), service.clone());

        service.gate.notify_one();
        let err = coordinator.renew(None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::Ended {
                reason: TerminalReason::RefreshUnreachable { .. }
            })
        ));
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_timeout_is_terminal() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        // Never released: only the timeout can settle this exchange.
        let service = GatedService::renewing("t2", None);
        let events = SessionBroadcaster::new(16);
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            service.clone(),
            events,
            Duration::from_secs(5),
        );

        let err = coordinator.renew(None).await.unwrap_err();
        match err {
            Error::Session(SessionError::Ended {
                reason: TerminalReason::RefreshUnreachable { message },
            }) => assert!(message.contains("5000ms")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.get().await.unwrap().is_none());
        assert!(!coordinator.is_refreshing().await);
    }

    #[tokio::test]
    async fn missing_session_ends_without_exchange_or_event() {
        let store = Arc::new(MemoryStore::new());
        let service = GatedService::renewing("t2", None);
        let (coordinator, events) = coordinator(store.clone(), service.clone());
        let mut observer = events.subscribe();

        let err = coordinator.renew(None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::Ended {
                reason: TerminalReason::NoRefreshToken
            })
        ));
        assert_eq!(service.exchanges(), 0);
        assert_eq!(observer.try_recv(), None);
    }

    #[tokio::test]
    async fn stale_token_skips_exchange() {
        let store = Arc::new(MemoryStore::with_pair(pair("t2")));
        let service = GatedService::renewing("t3", None);
        let (coordinator, _events) = coordinator(store, service.clone());

        let token = coordinator
            .renew(Some(&AccessToken::new("t1")))
            .await
            .unwrap();
        assert_eq!(token.as_str(), "t2");
        assert_eq!(service.exchanges(), 0);
    }

    #[tokio::test]
    async fn renews_again_after_settling() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::renewing("t2", Some("r2"));
        let (coordinator, _events) = coordinator(store.clone(), service.clone());

        service.gate.notify_one();
        coordinator.renew(Some(&AccessToken::new("t1"))).await.unwrap();
        let stored = store.get().await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_str(), "r2");

        // The second exchange finds no scripted answer and is rejected, which
        // proves a new cycle started.
        service.gate.notify_one();
        let second = coordinator.renew(Some(&AccessToken::new("t2"))).await;
        assert!(second.unwrap_err().is_session_ended());
        assert_eq!(service.exchanges(), 2);
    }

    #[tokio::test]
    async fn sign_out_during_exchange_is_not_undone() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::renewing("t2", None);
        let (coordinator, events) = coordinator(store.clone(), service.clone());
        let mut observer = events.subscribe();

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.renew(None).await })
        };
        wait_until_refreshing(&coordinator).await;

        let removed = coordinator.end().await.unwrap();
        assert!(removed.is_some());
        service.gate.notify_one();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::Ended {
                reason: TerminalReason::SignedOut
            })
        ));
        assert!(store.get().await.unwrap().is_none());
        assert_eq!(
            observer.try_recv(),
            Some(SessionEvent::LogoutRequired {
                cause: LogoutCause::SignedOut
            })
        );
        assert_eq!(observer.try_recv(), None);
    }

    #[tokio::test]
    async fn revocation_is_left_to_exchange_in_flight() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::renewing("t2", None);
        let (coordinator, _events) = coordinator(store.clone(), service.clone());

        let pending = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.renew(None).await })
        };
        wait_until_refreshing(&coordinator).await;

        assert!(!coordinator.revoke_if_idle(&RefreshToken::new("r1")).await);
        service.gate.notify_one();
        pending.await.unwrap().unwrap();
        assert!(store.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn revocation_ignores_replaced_session() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = GatedService::renewing("t2", None);
        let (coordinator, _events) = coordinator(store.clone(), service);

        assert!(!coordinator.revoke_if_idle(&RefreshToken::new("old")).await);
        assert!(store.get().await.unwrap().is_some());

        assert!(coordinator.revoke_if_idle(&RefreshToken::new("r1")).await);
        assert!(store.get().await.unwrap().is_none());
    }

    /// Panics on the first exchange, renews on later ones.
    struct PanicsOnce {
        exchanges: AtomicUsize,
    }

    #[async_trait]
    impl SessionService for PanicsOnce {
        async fn exchange(&self, _refresh_token: &RefreshToken) -> Result<ExchangeOutcome> {
            if self.exchanges.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("session service bug");
            }
            Ok(ExchangeOutcome::Renewed(RenewedTokens {
                access_token: AccessToken::new("t2"),
                refresh_token: None,
            }))
        }

        async fn check(&self, _refresh_token: &RefreshToken) -> Result<Liveness> {
            Ok(Liveness::Valid)
        }

        async fn revoke(&self, _refresh_token: &RefreshToken) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn panicking_exchange_returns_to_idle() {
        let store = Arc::new(MemoryStore::with_pair(pair("t1")));
        let service = Arc::new(PanicsOnce {
            exchanges: AtomicUsize::new(0),
        });
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            service.clone(),
            SessionBroadcaster::new(4),
            Duration::from_secs(10),
        );

        let err = coordinator.renew(None).await.unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::Interrupted)));
        assert!(!coordinator.is_refreshing().await);
        assert!(store.get().await.unwrap().is_some());

        let token = coordinator.renew(None).await.unwrap();
        assert_eq!(token.as_str(), "t2");
        assert_eq!(service.exchanges.load(Ordering::SeqCst), 2);
    }
}
