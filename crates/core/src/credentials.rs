//! Session credential store
//!
//! Holds the current access/refresh token pair for the lifetime of one
//! session. The pair is authoritative in memory and mirrored into a
//! [`SessionStorage`] backend under [`StorageKeys`]. Readers always observe
//! either a complete pair or nothing.

use crate::storage::{MemoryStorage, SessionStorage, StorageKeys};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Access and refresh token issued together by the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Pair produced by a refresh; the current refresh token is kept when the
    /// backend does not rotate it.
    #[must_use]
    pub fn rotate(&self, access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.unwrap_or_else(|| self.refresh.clone()),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

struct Inner {
    pair: RwLock<Option<TokenPair>>,
    storage: Arc<dyn SessionStorage>,
}

/// Cheaply cloneable handle to one session's credentials
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

impl CredentialStore {
    /// Empty store backed by in-process memory
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    /// Empty store mirroring into the given storage
    pub fn with_storage(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            inner: Arc::new(Inner {
                pair: RwLock::new(None),
                storage,
            }),
        }
    }

    /// Store seeded from whatever the storage already holds for this session.
    ///
    /// A half-written pair (one key without the other) is discarded.
    pub fn restore(storage: Arc<dyn SessionStorage>) -> Self {
        let access = storage.get_item(StorageKeys::ACCESS_TOKEN).ok().flatten();
        let refresh = storage.get_item(StorageKeys::REFRESH_TOKEN).ok().flatten();
        let store = Self::with_storage(storage);

        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                debug!("restored session credentials from storage");
                store.set(TokenPair::new(access, refresh));
            }
            (None, None) => {}
            _ => {
                warn!("discarding partial credentials found in session storage");
                store.clear();
            }
        }

        store
    }

    pub fn get(&self) -> Option<TokenPair> {
        self.inner
            .pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().map(|pair| pair.access)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get().map(|pair| pair.refresh)
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .pair
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replace both tokens at once
    pub fn set(&self, pair: TokenPair) {
        let mut guard = self
            .inner
            .pair
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.mirror(Some(&pair));
        *guard = Some(pair);
    }

    /// Remove both tokens
    pub fn clear(&self) {
        let mut guard = self
            .inner
            .pair
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.mirror(None);
        *guard = None;
    }

    /// Install `pair` only if the session still holds `expected_refresh`.
    ///
    /// Returns false when the session was cleared or replaced in the meantime.
    pub fn replace_if_current(&self, expected_refresh: &str, pair: TokenPair) -> bool {
        let mut guard = self
            .inner
            .pair
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().map(|current| current.refresh.as_str()) != Some(expected_refresh) {
            return false;
        }
        self.mirror(Some(&pair));
        *guard = Some(pair);
        true
    }

    /// Clear only if the session still holds `expected_refresh`
    pub fn clear_if_current(&self, expected_refresh: &str) -> bool {
        let mut guard = self
            .inner
            .pair
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().map(|current| current.refresh.as_str()) != Some(expected_refresh) {
            return false;
        }
        self.mirror(None);
        *guard = None;
        true
    }

    // Caller holds the write lock.
    fn mirror(&self, pair: Option<&TokenPair>) {
        let storage = &self.inner.storage;
        let result = match pair {
            Some(pair) => storage
                .set_item(StorageKeys::ACCESS_TOKEN, &pair.access)
                .and_then(|()| storage.set_item(StorageKeys::REFRESH_TOKEN, &pair.refresh)),
            None => storage
                .remove_item(StorageKeys::ACCESS_TOKEN)
                .and_then(|()| storage.remove_item(StorageKeys::REFRESH_TOKEN)),
        };

        if let Err(e) = result {
            warn!("Failed to mirror credentials into session storage: {e}");
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}
