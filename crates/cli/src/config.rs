//! CLI configuration utilities

use anyhow::{Context, Result};
use std::path::Path;
use warden_session::SessionConfig;

/// Load session configuration, applying command-line overrides last
pub fn load_session_config(path: Option<&Path>, base_url: Option<String>) -> Result<SessionConfig> {
    let mut config = SessionConfig::load(path).with_context(|| match path {
        Some(path) => format!("failed to load configuration from {}", path.display()),
        None => "failed to load configuration".to_string(),
    })?;

    if let Some(base_url) = base_url {
        config.client.base_url = base_url;
        config.validate()?;
    }

    Ok(config)
}
