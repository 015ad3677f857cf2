//! Device fingerprint sent alongside bearer credentials
//!
//! The fingerprint is a coarse anti-replay signal, not an authentication
//! factor. A fixed canary string is rendered through characteristics of the
//! execution environment and the output is hashed. When no rendering is
//! available a random string is used instead, so generation never fails.

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Upper bound on fingerprint length
pub const MAX_FINGERPRINT_LEN: usize = 32;

const CANARY: &str = "warden:fp <canvas> 0.1 \u{1f512} Cwm fjordbank glyphs vext quiz";
const FALLBACK_LEN: usize = 16;
const FIELD_SEPARATOR: u8 = 0x1f;

/// Something that can render the canary into environment-dependent bytes
pub trait FingerprintSource: Send + Sync {
    /// `None` when the technique is unavailable in this environment
    fn render(&self, canary: &str) -> Option<Vec<u8>>;
}

/// Renders the canary through host platform characteristics
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentSource;

impl EnvironmentSource {
    const ENV_TRAITS: [&'static str; 4] = ["LANG", "LC_ALL", "TERM", "TZ"];
}

impl FingerprintSource for EnvironmentSource {
    fn render(&self, canary: &str) -> Option<Vec<u8>> {
        let mut traits = vec![
            std::env::consts::OS.to_string(),
            std::env::consts::ARCH.to_string(),
            std::env::consts::FAMILY.to_string(),
        ];

        if let Ok(parallelism) = std::thread::available_parallelism() {
            traits.push(parallelism.to_string());
        }

        for var in Self::ENV_TRAITS {
            traits.push(std::env::var(var).unwrap_or_default());
        }

        let mut output = Vec::with_capacity(canary.len() + 64);
        for value in traits {
            output.extend_from_slice(value.as_bytes());
            output.push(FIELD_SEPARATOR);
        }
        output.extend_from_slice(canary.as_bytes());
        Some(output)
    }
}

/// Fingerprint generator over a pluggable rendering source
#[derive(Clone)]
pub struct Fingerprinter {
    source: Arc<dyn FingerprintSource>,
}

impl Fingerprinter {
    pub fn new(source: Arc<dyn FingerprintSource>) -> Self {
        Self { source }
    }

    /// Produce a fingerprint; falls back to a random string if rendering is unavailable
    pub fn generate(&self) -> String {
        match self.source.render(CANARY) {
            Some(rendered) if !rendered.is_empty() => digest(&rendered),
            _ => random_fallback(),
        }
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(Arc::new(EnvironmentSource))
    }
}

impl fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerprinter").finish_non_exhaustive()
    }
}

/// Fingerprint of the current environment
pub fn generate_fingerprint() -> String {
    Fingerprinter::default().generate()
}

fn digest(bytes: &[u8]) -> String {
    let mut encoded = hex::encode(Sha256::digest(bytes));
    encoded.truncate(MAX_FINGERPRINT_LEN);
    encoded
}

fn random_fallback() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(FALLBACK_LEN)
        .map(char::from)
        .collect()
}
