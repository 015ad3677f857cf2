//! Single-flight access token refresh
//!
//! When a call fails with 401 the coordinator exchanges the refresh token for
//! a new access token and hands back the original request, marked as a
//! replay and carrying the new credential. Concurrent failures share one
//! in-flight refresh, so exactly one refresh call reaches the backend per
//! expiry episode. A replay is never recovered again.
//!
//! The refresh runs on its own task: it completes and vacates the in-flight
//! slot even when every caller waiting on it has been dropped.

use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::transport::Transport;
use crate::types::{RefreshRequest, RefreshResponse};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use warden_core::{CredentialStore, SessionEvent, SessionEvents, TokenPair};

type RefreshOutcome = Result<TokenPair, Arc<ClientError>>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// How a failing request gets its new credentials
enum Attach {
    /// Join the refresh already in flight, or the one just started
    Pending(InFlight),
    /// The session already moved past the token this request was sent with
    Rotated(TokenPair),
    /// Nothing to refresh with
    Unavailable,
}

#[derive(Default)]
struct Slot {
    episode: u64,
    in_flight: Option<InFlight>,
}

/// Owns the refresh protocol for one session
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    refresh_path: String,
    events: SessionEvents,
    slot: Arc<Mutex<Slot>>,
}

impl RefreshCoordinator {
    /// `transport` must be the bare transport, never the intercepted client
    pub fn new(
        transport: Arc<dyn Transport>,
        store: CredentialStore,
        refresh_path: impl Into<String>,
        events: SessionEvents,
    ) -> Self {
        Self {
            transport,
            store,
            refresh_path: refresh_path.into(),
            events,
            slot: Arc::default(),
        }
    }

    /// Whether a refresh call is currently outstanding
    pub fn is_refreshing(&self) -> bool {
        lock(&self.slot).in_flight.is_some()
    }

    /// Turn a 401 on `request` into the request to replay.
    ///
    /// Returns `failure` unchanged when `request` is already a replay or the
    /// session holds no refresh token, and `ClientError::RefreshFailed` when
    /// the refresh itself was rejected (the session is cleared by then).
    ///
    /// Must be called within a tokio runtime.
    pub async fn recover(
        &self,
        request: &ApiRequest,
        failure: ClientError,
    ) -> Result<ApiRequest, ClientError> {
        if request.is_retry() {
            debug!(path = request.path(), "replay rejected again, giving up");
            return Err(failure);
        }

        let mut replay = request.clone();
        replay.mark_retry();

        let pair = match self.attach(request.bearer_token()) {
            Attach::Unavailable => {
                debug!(path = request.path(), "no refresh token, propagating 401");
                return Err(failure);
            }
            Attach::Rotated(pair) => {
                debug!(path = request.path(), "token already rotated, replaying");
                pair
            }
            Attach::Pending(in_flight) => in_flight.await.map_err(ClientError::RefreshFailed)?,
        };

        if let Err(e) = replay.set_bearer(&pair.access) {
            warn!("refreshed access token is not a valid header value: {e}");
        }
        Ok(replay)
    }

    fn attach(&self, sent_with: Option<&str>) -> Attach {
        let mut slot = lock(&self.slot);

        if let Some(in_flight) = slot.in_flight.as_ref() {
            debug!("joining in-flight token refresh");
            return Attach::Pending(in_flight.clone());
        }

        let Some(current) = self.store.get() else {
            return Attach::Unavailable;
        };

        match sent_with {
            Some(token) if token == current.access => {}
            _ => return Attach::Rotated(current),
        }

        slot.episode += 1;
        let episode = slot.episode;
        let refresh = run_refresh(
            self.transport.clone(),
            self.store.clone(),
            self.events.clone(),
            self.refresh_path.clone(),
            current,
        );
        let settle = self.slot.clone();

        // The task cannot vacate the slot before it is filled: we hold the lock.
        let task = tokio::spawn(async move {
            let outcome = refresh.await;
            let mut slot = lock(&settle);
            if slot.episode == episode {
                slot.in_flight = None;
            }
            outcome
        });

        let in_flight = async move {
            task.await.unwrap_or_else(|e| {
                warn!("token refresh task did not complete: {e}");
                Err(Arc::new(ClientError::RefreshAborted(e.to_string())))
            })
        }
        .boxed()
        .shared();
        slot.in_flight = Some(in_flight.clone());
        Attach::Pending(in_flight)
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_refresh(
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    events: SessionEvents,
    path: String,
    current: TokenPair,
) -> RefreshOutcome {
    info!("access token rejected, refreshing");

    match request_refresh(transport.as_ref(), &path, &current.refresh).await {
        Ok(tokens) => {
            let rotated = tokens.refresh.is_some();
            let pair = current.rotate(tokens.access, tokens.refresh);
            if !store.replace_if_current(&current.refresh, pair.clone()) {
                debug!("session changed during refresh, discarding new tokens");
                return Err(Arc::new(ClientError::SessionEnded));
            }
            info!(rotated, "access token refreshed");
            events.emit(SessionEvent::TokensRefreshed);
            Ok(pair)
        }
        Err(e) => {
            warn!("token refresh failed, clearing session: {e}");
            if store.clear_if_current(&current.refresh) {
                events.emit(SessionEvent::RefreshFailed);
            }
            Err(Arc::new(e))
        }
    }
}

async fn request_refresh(
    transport: &dyn Transport,
    path: &str,
    refresh: &str,
) -> Result<RefreshResponse, ClientError> {
    let request = ApiRequest::post(path).json(&RefreshRequest { refresh })?;
    transport.send(&request).await?.into_result()?.json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ApiResponse;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers every refresh call with a fixed status/body after a short delay
    struct StubTransport {
        status: StatusCode,
        body: &'static str,
        calls: AtomicUsize,
    }

    impl StubTransport {
        fn new(status: StatusCode, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ApiResponse::new(
                self.status,
                HeaderMap::new(),
                Bytes::from_static(self.body.as_bytes()),
            ))
        }
    }

    fn coordinator(transport: Arc<StubTransport>, store: &CredentialStore) -> RefreshCoordinator {
        RefreshCoordinator::new(
            transport,
            store.clone(),
            "/token/refresh",
            SessionEvents::new(),
        )
    }

    fn failed_request(token: &str) -> ApiRequest {
        let mut request = ApiRequest::get("/wallets");
        request.set_bearer(token).unwrap();
        request
    }

    fn unauthorized() -> ClientError {
        ClientError::AuthenticationFailed("expired".into())
    }

    #[tokio::test]
    async fn replays_are_never_recovered_twice() {
        let transport = StubTransport::new(StatusCode::OK, r#"{"access":"a2"}"#);
        let store = CredentialStore::new();
        store.set(TokenPair::new("a1", "r1"));
        let coordinator = coordinator(transport.clone(), &store);

        let replay = coordinator
            .recover(&failed_request("a1"), unauthorized())
            .await
            .unwrap();
        assert!(replay.is_retry());
        assert_eq!(replay.bearer_token(), Some("a2"));

        let result = coordinator.recover(&replay, unauthorized()).await;
        assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn propagates_original_failure_without_refresh_token() {
        let transport = StubTransport::new(StatusCode::OK, r#"{"access":"a2"}"#);
        let store = CredentialStore::new();
        let coordinator = coordinator(transport.clone(), &store);

        let result = coordinator
            .recover(&failed_request("a1"), unauthorized())
            .await;

        assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_failures_share_one_refresh() {
        let transport = StubTransport::new(StatusCode::OK, r#"{"access":"a2","refresh":"r2"}"#);
        let store = CredentialStore::new();
        store.set(TokenPair::new("a1", "r1"));
        let coordinator = coordinator(transport.clone(), &store);

        let requests: Vec<_> = (0..6).map(|_| failed_request("a1")).collect();
        let replays = futures::future::join_all(
            requests
                .iter()
                .map(|request| coordinator.recover(request, unauthorized())),
        )
        .await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        for replay in replays {
            assert_eq!(replay.unwrap().bearer_token(), Some("a2"));
        }
        assert_eq!(store.get(), Some(TokenPair::new("a2", "r2")));
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn late_failures_reuse_already_rotated_token() {
        let transport = StubTransport::new(StatusCode::OK, r#"{"access":"a3"}"#);
        let store = CredentialStore::new();
        store.set(TokenPair::new("a2", "r1"));
        let coordinator = coordinator(transport.clone(), &store);

        let replay = coordinator
            .recover(&failed_request("a1"), unauthorized())
            .await
            .unwrap();

        assert_eq!(replay.bearer_token(), Some("a2"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_refresh_clears_the_session() {
        let transport = StubTransport::new(StatusCode::UNAUTHORIZED, "refresh expired");
        let store = CredentialStore::new();
        store.set(TokenPair::new("a1", "r1"));
        let coordinator = coordinator(transport, &store);

        let result = coordinator
            .recover(&failed_request("a1"), unauthorized())
            .await;

        match result {
            Err(ClientError::RefreshFailed(cause)) => assert!(cause.is_unauthorized()),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn refresh_does_not_resurrect_a_cleared_session() {
        let transport = StubTransport::new(StatusCode::OK, r#"{"access":"a2"}"#);
        let store = CredentialStore::new();
        store.set(TokenPair::new("a1", "r1"));
        let coordinator = coordinator(transport, &store);

        let request = failed_request("a1");
        let recovering = coordinator.recover(&request, unauthorized());
        let logout = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            store.clear();
        };
        let (result, ()) = tokio::join!(recovering, logout);

        assert!(matches!(
            result,
            Err(ClientError::RefreshFailed(ref cause)) if matches!(**cause, ClientError::SessionEnded)
        ));
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn refresh_completes_after_its_caller_is_dropped() {
        let transport = StubTransport::new(StatusCode::OK, r#"{"access":"a2"}"#);
        let store = CredentialStore::new();
        store.set(TokenPair::new("a1", "r1"));
        let coordinator = coordinator(transport.clone(), &store);

        let request = failed_request("a1");
        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            coordinator.recover(&request, unauthorized()),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.get(), Some(TokenPair::new("a2", "r1")));

        let replay = coordinator
            .recover(&failed_request("a1"), unauthorized())
            .await
            .unwrap();
        assert_eq!(replay.bearer_token(), Some("a2"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
