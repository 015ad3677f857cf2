//! Warden session lifecycle
//!
//! Inactivity timeout, route guarding and the owned `AuthSession` that ties
//! the credential store and the intercepted client to a UI host.

pub mod config;
pub mod error;
pub mod guard;
pub mod navigator;
pub mod session;
pub mod watchdog;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use guard::{GuardState, RouteGuard};
pub use navigator::{Navigator, RedirectReason};
pub use session::AuthSession;
pub use watchdog::{ActivityEvent, DEFAULT_IDLE_TIMEOUT, InactivityWatchdog, WatchdogState};
