//! Session error types

use thiserror::Error;
use warden_http::ClientError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl SessionError {
    /// Whether the session is gone and the user must log in again
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_auth_expired())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
