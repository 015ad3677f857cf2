//! Layered session configuration

use crate::error::{Result, SessionError};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use warden_http::ClientConfig;

const ENV_PREFIX: &str = "WARDEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub client: ClientConfig,

    /// Inactivity window in seconds before the session is ended
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            idle_timeout_secs: 30 * 60,
        }
    }
}

impl SessionConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Environment variables use the `WARDEN__` prefix with `__` between
    /// nested keys, e.g. `WARDEN__CLIENT__BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the merged values do
    /// not describe a usable session
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            return Err(SessionError::Invalid(
                "idle_timeout_secs must be greater than zero".into(),
            ));
        }
        self.client.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_use_thirty_minute_window() {
        let config = SessionConfig::default();
        assert_eq!(config.idle_timeout(), Duration::from_secs(1800));
        config.validate().unwrap();
    }

    #[test]
    fn file_overrides_defaults() {
        let file = toml_file(
            r#"
            idle_timeout_secs = 600

            [client]
            base_url = "https://api.example.com"

            [client.endpoints]
            refresh = "/auth/refresh"
            "#,
        );

        let config = SessionConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.idle_timeout_secs, 600);
        assert_eq!(config.client.base_url, "https://api.example.com");
        assert_eq!(config.client.endpoints.refresh, "/auth/refresh");
        assert_eq!(config.client.endpoints.login, "/login");
        assert_eq!(config.client.timeout_secs, 30);
    }

    #[test]
    fn zero_idle_window_is_rejected() {
        let file = toml_file("idle_timeout_secs = 0\n");

        let result = SessionConfig::load(Some(file.path()));

        assert!(matches!(result, Err(SessionError::Invalid(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = SessionConfig::load(Some(Path::new("/nonexistent/warden.toml")));
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn environment_overrides_file() {
        const VAR: &str = "WARDEN__CLIENT__USER_AGENT";
        let file = toml_file("[client]\nuser_agent = \"from-file\"\n");

        // SAFETY: no other test in this crate touches this variable
        unsafe { std::env::set_var(VAR, "from-env") };
        let result = SessionConfig::load(Some(file.path()));
        unsafe { std::env::remove_var(VAR) };

        assert_eq!(result.unwrap().client.user_agent, "from-env");
    }
}
