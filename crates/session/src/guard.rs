//! Route guard for protected views
//!
//! Each navigation into a protected view probes the token verification
//! endpoint once. While the probe runs the view shows a loading state; a
//! failure (after the refresh path had its chance) redirects to login.

use crate::navigator::{Navigator, RedirectReason};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info};
use warden_http::{ClientError, SessionClient};

/// What a protected view should render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Authorized,
    Redirected(RedirectReason),
}

pub struct RouteGuard {
    client: SessionClient,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<GuardState>,
    navigation: AtomicU64,
}

impl RouteGuard {
    pub fn new(client: SessionClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            navigator,
            state: watch::Sender::new(GuardState::Loading),
            navigation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> GuardState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    /// Decide whether `route` may render.
    ///
    /// A probe overtaken by a later navigation is discarded; its caller gets
    /// whatever state the newer navigation has produced so far.
    pub async fn enter(&self, route: &str) -> GuardState {
        let navigation = self.navigation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(GuardState::Loading);

        let outcome = if self.client.store().is_authenticated() {
            debug!(route, "probing session");
            match self.client.verify().await {
                Ok(()) => GuardState::Authorized,
                Err(e) => GuardState::Redirected(redirect_reason(&e)),
            }
        } else {
            GuardState::Redirected(RedirectReason::Unauthenticated)
        };

        if self.navigation.load(Ordering::SeqCst) != navigation {
            debug!(route, "discarding stale probe result");
            return self.state();
        }

        self.state.send_replace(outcome);
        if let GuardState::Redirected(reason) = outcome {
            info!(route, %reason, "redirecting to login");
            self.navigator.redirect_to_login(reason);
        }
        outcome
    }
}

fn redirect_reason(error: &ClientError) -> RedirectReason {
    if error.is_auth_expired() {
        RedirectReason::Unauthenticated
    } else {
        RedirectReason::ProbeFailed
    }
}
