use tracing::warn;
use warden_session::{Navigator, RedirectReason};

/// Terminal stand-in for the login screen
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn redirect_to_login(&self, reason: RedirectReason) {
        warn!(%reason, "session ended");
        eprintln!("Session ended ({reason}); log in again to continue");
    }
}
