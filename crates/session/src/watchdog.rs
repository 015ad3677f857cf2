//! Inactivity watchdog
//!
//! One background task per mounted session view. Every qualifying user
//! activity pushes the deadline out by the idle window; when the deadline
//! elapses the credentials are wiped and the user is sent to login.

use crate::navigator::{Navigator, RedirectReason};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use warden_core::{CredentialStore, SessionEvent, SessionEvents};

/// Idle window after which a session is ended
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// User interactions that count as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerMove,
    Click,
    KeyPress,
    Scroll,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// Deadline scheduled, activity reschedules it
    Armed,
    /// Deadline elapsed and the session was cleared
    Expired,
    /// Torn down before expiring
    Disarmed,
}

/// Handle to a running watchdog; dropping it tears the watchdog down
pub struct InactivityWatchdog {
    activity: watch::Sender<Instant>,
    state: Arc<watch::Sender<WatchdogState>>,
    cancel: CancellationToken,
    idle: Duration,
}

impl InactivityWatchdog {
    /// Arm a watchdog for `store`.
    ///
    /// Spawns onto the current tokio runtime.
    pub fn install(
        store: CredentialStore,
        navigator: Arc<dyn Navigator>,
        events: SessionEvents,
        idle: Duration,
    ) -> Self {
        let (activity, activity_rx) = watch::channel(Instant::now());
        let state = Arc::new(watch::Sender::new(WatchdogState::Armed));
        let cancel = CancellationToken::new();

        let task = Expiry {
            store,
            navigator,
            events,
            state: state.clone(),
        };
        tokio::spawn(watch_idle(activity_rx, idle, cancel.clone(), task));
        debug!(idle_secs = idle.as_secs(), "inactivity watchdog armed");

        Self {
            activity,
            state,
            cancel,
            idle,
        }
    }

    /// Push the deadline out to now plus the idle window
    pub fn record_activity(&self, event: ActivityEvent) {
        if self.state() != WatchdogState::Armed {
            return;
        }
        trace!(?event, "activity");
        self.activity.send_replace(Instant::now());
    }

    pub fn state(&self) -> WatchdogState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchdogState> {
        self.state.subscribe()
    }

    pub const fn idle_timeout(&self) -> Duration {
        self.idle
    }

    /// Cancel the pending deadline without touching the session
    pub fn teardown(&self) {
        self.cancel.cancel();
        if transition(&self.state, WatchdogState::Disarmed) {
            debug!("inactivity watchdog disarmed");
        }
    }
}

impl Drop for InactivityWatchdog {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// What happens when the deadline elapses
struct Expiry {
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
    events: SessionEvents,
    state: Arc<watch::Sender<WatchdogState>>,
}

impl Expiry {
    fn fire(self, idle: Duration) {
        if !transition(&self.state, WatchdogState::Expired) {
            return;
        }
        warn!(idle_secs = idle.as_secs(), "session idle, logging out");
        self.store.clear();
        self.navigator.redirect_to_login(RedirectReason::Inactive);
        self.events.emit(SessionEvent::Expired);
    }
}

async fn watch_idle(
    mut activity: watch::Receiver<Instant>,
    idle: Duration,
    cancel: CancellationToken,
    expiry: Expiry,
) {
    let mut deadline = *activity.borrow_and_update() + idle;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            changed = activity.changed() => {
                if changed.is_err() {
                    return;
                }
                deadline = *activity.borrow_and_update() + idle;
            }
            () = sleep_until(deadline) => break,
        }
    }

    info!("inactivity deadline reached");
    expiry.fire(idle);
}

// Only an armed watchdog changes state; expiry and teardown race otherwise.
fn transition(state: &watch::Sender<WatchdogState>, next: WatchdogState) -> bool {
    state.send_if_modified(|current| {
        if *current == WatchdogState::Armed {
            *current = next;
            true
        } else {
            false
        }
    })
}
