//! Boundary to the navigation layer

use std::fmt;

/// Why a session was sent back to the login surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// No credentials, or the backend rejected them and refresh could not help
    Unauthenticated,
    /// The validity probe failed for a reason other than authentication
    ProbeFailed,
    /// The inactivity deadline elapsed
    Inactive,
}

impl fmt::Display for RedirectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::ProbeFailed => write!(f, "probe failed"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Moves the user to the login surface.
///
/// Implemented by the host UI; called from the watchdog task and the route
/// guard, so implementations must not block.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self, reason: RedirectReason);
}
