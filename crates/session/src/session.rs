//! Explicitly owned session state
//!
//! `AuthSession` ties one credential store, one intercepted client, one
//! event channel and the inactivity watchdog of the mounted view together.
//! Hosts create one per session and drop it (or call `logout`) to end it.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::guard::RouteGuard;
use crate::navigator::{Navigator, RedirectReason};
use crate::watchdog::{ActivityEvent, InactivityWatchdog, WatchdogState};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};
use warden_core::{CredentialStore, SessionEvent, TokenPair};
use warden_http::{ApiRequest, ApiResponse, ClientError, SessionClient};

pub struct AuthSession {
    client: SessionClient,
    navigator: Arc<dyn Navigator>,
    idle_timeout: Duration,
    watchdog: Mutex<Option<InactivityWatchdog>>,
    /// Set once the user has been sent to login for the current session
    ended: AtomicBool,
}

impl AuthSession {
    /// Fresh, logged-out session built from configuration
    pub fn new(config: &SessionConfig, navigator: Arc<dyn Navigator>) -> Result<Self> {
        config.validate()?;
        let client = SessionClient::builder()
            .config(config.client.clone())
            .build()?;
        Ok(Self::from_parts(client, navigator, config.idle_timeout()))
    }

    /// Session around an already configured client
    pub fn from_parts(
        client: SessionClient,
        navigator: Arc<dyn Navigator>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            client,
            navigator,
            idle_timeout,
            watchdog: Mutex::new(None),
            ended: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    pub fn store(&self) -> &CredentialStore {
        self.client.store()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.client.events().subscribe()
    }

    /// Log in and arm the inactivity watchdog
    pub async fn login<C>(&self, credentials: &C) -> Result<TokenPair>
    where
        C: Serialize + ?Sized + Sync,
    {
        let pair = self.client.login(credentials).await?;
        self.mount();
        Ok(pair)
    }

    /// Install the watchdog for the session-bearing view.
    ///
    /// Idempotent while a watchdog is armed; an expired or disarmed one is
    /// replaced.
    pub fn mount(&self) {
        self.ended.store(false, Ordering::SeqCst);
        let mut slot = self.watchdog_slot();
        if slot
            .as_ref()
            .is_some_and(|watchdog| watchdog.state() == WatchdogState::Armed)
        {
            return;
        }

        *slot = Some(InactivityWatchdog::install(
            self.store().clone(),
            self.navigator.clone(),
            self.client.events().clone(),
            self.idle_timeout,
        ));
    }

    /// Tear the watchdog down; credentials are left alone
    pub fn unmount(&self) {
        if let Some(watchdog) = self.watchdog_slot().take() {
            watchdog.teardown();
        }
    }

    pub fn record_activity(&self, event: ActivityEvent) {
        if let Some(watchdog) = self.watchdog_slot().as_ref() {
            watchdog.record_activity(event);
        }
    }

    pub fn watchdog_state(&self) -> Option<WatchdogState> {
        self.watchdog_slot().as_ref().map(InactivityWatchdog::state)
    }

    /// Guard for protected views of this session
    pub fn guard(&self) -> RouteGuard {
        RouteGuard::new(self.client.clone(), self.navigator.clone())
    }

    /// Send a business request, redirecting to login if it ends the session
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.client
            .send(request)
            .await
            .map_err(|e| self.handle_failure(e))
    }

    /// Redirect to login when `error` means the session is gone.
    ///
    /// Concurrent failures of one session redirect once. Anything else is
    /// returned for the caller to surface.
    pub fn handle_failure(&self, error: ClientError) -> SessionError {
        if error.is_auth_expired()
            && !self.store().is_authenticated()
            && !self.ended.swap(true, Ordering::SeqCst)
        {
            info!("session ended by backend, redirecting to login");
            self.unmount();
            self.navigator
                .redirect_to_login(RedirectReason::Unauthenticated);
        }
        SessionError::Client(error)
    }

    pub async fn logout(&self) {
        self.unmount();
        self.client.logout().await;
        debug!("session torn down");
    }

    fn watchdog_slot(&self) -> MutexGuard<'_, Option<InactivityWatchdog>> {
        self.watchdog.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
