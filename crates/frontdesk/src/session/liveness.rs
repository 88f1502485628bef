//! Periodic server-side check of the refresh token.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::remote::{Liveness, SessionService};
use crate::store::CredentialStore;

use super::coordinator::RefreshCoordinator;

/// The outcome of one liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessReport {
    /// Nobody is signed in; nothing was checked.
    NoSession,
    /// The server still accepts the refresh token.
    Valid,
    /// The server revoked the refresh token and the session was torn down.
    Revoked,
    /// The server reported the token invalid, but a renewal was in flight or
    /// the session changed since the check. The session was left alone.
    Deferred,
    /// The check itself failed. The session was left alone.
    Inconclusive,
}

/// Periodically asks the session service whether the stored refresh token is
/// still valid and tears the session down when it is not.
///
/// A failed check never ends the session; only an explicit "invalid" answer
/// does.
#[derive(Clone)]
pub struct LivenessPoller {
    store: Arc<dyn CredentialStore>,
    service: Arc<dyn SessionService>,
    coordinator: RefreshCoordinator,
    interval: Duration,
}

impl LivenessPoller {
    /// A zero `interval` is treated as one second.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        service: Arc<dyn SessionService>,
        coordinator: RefreshCoordinator,
        interval: Duration,
    ) -> Self {
        let interval = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };

        Self {
            store,
            service,
            coordinator,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single check.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> LivenessReport {
        let pair = match self.store.get().await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                debug!("No session; skipping liveness check");
                return LivenessReport::NoSession;
            }
            Err(e) => {
                warn!(error = %e, "Could not read credentials for liveness check");
                return LivenessReport::Inconclusive;
            }
        };

        match self.service.check(&pair.refresh_token).await {
            Ok(Liveness::Valid) => {
                debug!("Refresh token still valid");
                LivenessReport::Valid
            }
            Ok(Liveness::Invalid) => {
                if self.coordinator.revoke_if_idle(&pair.refresh_token).await {
                    info!("Refresh token revoked server-side");
                    LivenessReport::Revoked
                } else {
                    LivenessReport::Deferred
                }
            }
            Err(e) => {
                warn!(error = %e, "Liveness check failed");
                LivenessReport::Inconclusive
            }
        }
    }

    /// Check every `interval` until `cancel` fires.
    ///
    /// The first check runs one interval after the call, not immediately.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = timer.tick() => {}
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    report = self.poll_once() => debug!(?report, "Liveness check finished"),
                }
            }

            debug!("Liveness poller stopped");
        })
    }
}

impl std::fmt::Debug for LivenessPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessPoller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::auth::{AccessToken, CredentialPair, RefreshToken, SessionIdentity};
    use crate::config::ClientConfig;
    use crate::error::{Error, TransportError};
    use crate::remote::ExchangeOutcome;
    use crate::session::{LogoutCause, SessionBroadcaster, SessionClient, SessionEvent};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Answer {
        Valid,
        Invalid,
        Unreachable,
    }

    struct ScriptedService {
        answer: Answer,
        checks: AtomicUsize,
    }

    impl ScriptedService {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                checks: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionService for ScriptedService {
        async fn exchange(&self, _refresh_token: &RefreshToken) -> Result<ExchangeOutcome> {
            Ok(ExchangeOutcome::Rejected)
        }

        async fn check(&self, _refresh_token: &RefreshToken) -> Result<Liveness> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Answer::Valid => Ok(Liveness::Valid),
                Answer::Invalid => Ok(Liveness::Invalid),
                Answer::Unreachable => Err(Error::Transport(TransportError::Connection {
                    message: "connection refused".to_string(),
                })),
            }
        }

        async fn revoke(&self, _refresh_token: &RefreshToken) -> Result<()> {
            Ok(())
        }
    }

    fn signed_in() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_pair(CredentialPair::new(
            AccessToken::new("t1"),
            RefreshToken::new("r1"),
            SessionIdentity::new("u-1", "manager"),
        )))
    }

    fn poller(
        store: Arc<MemoryStore>,
        service: Arc<ScriptedService>,
    ) -> (LivenessPoller, SessionBroadcaster) {
        let events = SessionBroadcaster::new(8);
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            service.clone(),
            events.clone(),
            Duration::from_secs(10),
        );
        let poller = LivenessPoller::new(store, service, coordinator, Duration::from_secs(300));
        (poller, events)
    }

    #[tokio::test]
    async fn valid_token_keeps_session() {
        let store = signed_in();
        let (poller, _events) = poller(store.clone(), ScriptedService::new(Answer::Valid));

        assert_eq!(poller.poll_once().await, LivenessReport::Valid);
        assert!(store.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_token_tears_session_down() {
        let store = signed_in();
        let (poller, events) = poller(store.clone(), ScriptedService::new(Answer::Invalid));
        let mut observer = events.subscribe();

        assert_eq!(poller.poll_once().await, LivenessReport::Revoked);
        assert!(store.get().await.unwrap().is_none());
        assert_eq!(
            observer.try_recv(),
            Some(SessionEvent::LogoutRequired {
                cause: LogoutCause::Revoked
            })
        );
    }

    #[tokio::test]
    async fn failed_check_is_not_a_revocation() {
        let store = signed_in();
        let (poller, events) = poller(store.clone(), ScriptedService::new(Answer::Unreachable));
        let mut observer = events.subscribe();

        assert_eq!(poller.poll_once().await, LivenessReport::Inconclusive);
        assert!(store.get().await.unwrap().is_some());
        assert_eq!(store.revision(), 0);
        assert_eq!(observer.try_recv(), None);
    }

    #[tokio::test]
    async fn signed_out_skips_check() {
        let store = Arc::new(MemoryStore::new());
        let service = ScriptedService::new(Answer::Invalid);
        let (poller, _events) = poller(store, service.clone());

        assert_eq!(poller.poll_once().await, LivenessReport::NoSession);
        assert_eq!(service.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poller_checks_each_interval_until_cancelled() {
        let store = signed_in();
        let service = ScriptedService::new(Answer::Valid);
        let (poller, _events) = poller(store, service.clone());

        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(service.checks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(service.checks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(service.checks.load(Ordering::SeqCst), 2);

        cancel.cancel();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(service.checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_from_config_still_polls() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"baseUrl": "https://admin.example.com", "livenessIntervalSecs": 0}"#,
        )
        .unwrap();
        let store = signed_in();
        let service = ScriptedService::new(Answer::Valid);
        let client = SessionClient::with_service(config, store, service.clone()).unwrap();

        let poller = client.liveness_poller();
        assert_eq!(poller.interval(), Duration::from_secs(1));

        let cancel = CancellationToken::new();
        let handle = poller.spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(service.checks.load(Ordering::SeqCst), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn zero_interval_is_raised_to_one_second() {
        let store = signed_in();
        let service = ScriptedService::new(Answer::Valid);
        let coordinator = RefreshCoordinator::new(
            store.clone(),
            service.clone(),
            SessionBroadcaster::new(1),
            Duration::from_secs(10),
        );
        let poller = LivenessPoller::new(store, service, coordinator, Duration::ZERO);
        assert_eq!(poller.interval(), Duration::from_secs(1));
    }
}
