//! Client configuration

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend paths used by the session subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub login: String,
    pub refresh: String,
    pub verify: String,
    pub logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            refresh: "/token/refresh".to_string(),
            verify: "/token/verify".to_string(),
            logout: "/logout".to_string(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub base_url: String,

    /// Request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Header carrying the device fingerprint
    pub fingerprint_header: String,

    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            user_agent: concat!("warden-client/", env!("CARGO_PKG_VERSION")).to_string(),
            fingerprint_header: "x-device-fingerprint".to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Check the configuration before building a client
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the base URL is missing or malformed
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.trim().is_empty() {
            return Err(ClientError::Configuration("base_url is required".into()));
        }

        url::Url::parse(&self.base_url).map_err(|e| {
            ClientError::Configuration(format!("invalid base_url {:?}: {e}", self.base_url))
        })?;

        for path in [
            &self.endpoints.login,
            &self.endpoints.refresh,
            &self.endpoints.verify,
            &self.endpoints.logout,
        ] {
            if !path.starts_with('/') {
                return Err(ClientError::Configuration(format!(
                    "endpoint path {path:?} must start with '/'"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ClientConfig::default().validate().unwrap();
        assert_eq!(ClientConfig::default().endpoints.refresh, "/token/refresh");
    }

    #[test]
    fn rejects_missing_or_malformed_base_url() {
        assert!(matches!(
            ClientConfig::new("").validate(),
            Err(ClientError::Configuration(_))
        ));
        assert!(matches!(
            ClientConfig::new("not a url").validate(),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_relative_endpoint_paths() {
        let mut config = ClientConfig::default();
        config.endpoints.verify = "token/verify".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut config = ClientConfig::default();
        config.timeout_secs = 0;
        assert_eq!(config.timeout(), None);
    }
}
