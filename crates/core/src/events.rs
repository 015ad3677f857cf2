//! Session lifecycle notifications for the UI layer

use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Transitions a session goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    TokensRefreshed,
    /// The refresh token was rejected; the session has been cleared
    RefreshFailed,
    /// Inactivity timeout elapsed; the session has been cleared
    Expired,
    LoggedOut,
}

/// Broadcast channel shared by every component of one session
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
