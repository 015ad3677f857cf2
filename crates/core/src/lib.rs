//! Warden core types: session credentials, storage backends, device fingerprints

pub mod credentials;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod storage;
pub mod telemetry;

pub use credentials::{CredentialStore, TokenPair};
pub use error::{CoreError, CoreResult};
pub use events::{SessionEvent, SessionEvents};
pub use fingerprint::{
    EnvironmentSource, FingerprintSource, Fingerprinter, MAX_FINGERPRINT_LEN, generate_fingerprint,
};
pub use storage::{MemoryStorage, SessionStorage, StorageKeys};
