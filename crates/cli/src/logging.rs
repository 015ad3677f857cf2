use anyhow::Result;
use tracing::Level;
use warden_core::telemetry::{InstrumentationConfig, init_tracing};

const CRATES: [&str; 4] = ["warden", "warden_core", "warden_http", "warden_session"];

/// Initialize logging for the CLI
///
/// Starts from the environment (`RUST_LOG`, `SERVICE_NAME`,
/// `WARDEN_LOG_JSON`). Without `RUST_LOG` the filter comes from `level`;
/// `--json-logs` can only switch JSON output on.
pub fn init_logging(level: Level, json: bool) -> Result<()> {
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let config = instrumentation(InstrumentationConfig::from_env(), rust_log_set, level, json);
    init_tracing(&config)
}

fn instrumentation(
    env: InstrumentationConfig,
    rust_log_set: bool,
    level: Level,
    json: bool,
) -> InstrumentationConfig {
    let json = env.json || json;
    let config = if rust_log_set {
        env
    } else {
        env.with_log_level(default_filter(level))
    };
    config.with_json(json)
}

fn default_filter(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_covers_every_crate() {
        assert_eq!(
            default_filter(Level::DEBUG),
            "warden=debug,warden_core=debug,warden_http=debug,warden_session=debug"
        );
    }

    #[test]
    fn environment_settings_survive_flags() {
        let mut env = InstrumentationConfig::default().with_json(true);
        env.service_name = "wallet-ui".into();

        let config = instrumentation(env, false, Level::WARN, false);

        assert!(config.json);
        assert_eq!(config.service_name, "wallet-ui");
        assert!(config.log_level.starts_with("warden=warn"));
    }

    #[test]
    fn rust_log_wins_over_level_flag() {
        let env = InstrumentationConfig::default().with_log_level("warden_http=trace");

        let config = instrumentation(env, true, Level::ERROR, true);

        assert_eq!(config.log_level, "warden_http=trace");
        assert!(config.json);
    }
}
