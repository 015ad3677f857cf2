//! Session-scoped key/value storage backing the credential store

use crate::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Fixed keys the credential store writes under
pub struct StorageKeys;

impl StorageKeys {
    /// Key holding the access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Key holding the refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";
}

/// Storage that lives exactly as long as the browsing/process session.
///
/// Implementations must not persist across application restarts.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> CoreResult<()>;
    fn remove_item(&self, key: &str) -> CoreResult<()>;
}

/// In-process storage, dropped together with the session that owns it
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| CoreError::Storage("session storage lock poisoned".into()))
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> CoreResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
