//! Request/response interceptor pipeline
//!
//! Request interceptors decorate a request before it reaches the transport
//! and cannot fail it. Response interceptors see the outcome of a call and may
//! replace it, including by replaying the request through the client.

use crate::client::SessionClient;
use crate::error::ClientError;
use crate::refresh::RefreshCoordinator;
use crate::request::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::{debug, warn};
use warden_core::{CredentialStore, Fingerprinter};

/// Transform applied to every outgoing request
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut ApiRequest);
}

/// Transform applied to every completed call
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// `request` is the request exactly as it was sent
    async fn intercept(
        &self,
        client: &SessionClient,
        request: &ApiRequest,
        outcome: Result<ApiResponse, ClientError>,
    ) -> Result<ApiResponse, ClientError>;
}

/// Attaches the bearer credential and device fingerprint from the session
pub struct AuthHeaderInterceptor {
    store: CredentialStore,
    fingerprinter: Fingerprinter,
    fingerprint_header: HeaderName,
}

impl AuthHeaderInterceptor {
    pub const fn new(
        store: CredentialStore,
        fingerprinter: Fingerprinter,
        fingerprint_header: HeaderName,
    ) -> Self {
        Self {
            store,
            fingerprinter,
            fingerprint_header,
        }
    }
}

impl RequestInterceptor for AuthHeaderInterceptor {
    fn intercept(&self, request: &mut ApiRequest) {
        let Some(access) = self.store.access_token() else {
            debug!(path = request.path(), "no access token, sending unauthenticated");
            return;
        };

        if let Err(e) = request.set_bearer(&access) {
            warn!(path = request.path(), "access token is not a valid header value: {e}");
            return;
        }

        match HeaderValue::from_str(&self.fingerprinter.generate()) {
            Ok(value) => {
                request
                    .headers_mut()
                    .insert(self.fingerprint_header.clone(), value);
            }
            Err(e) => warn!("fingerprint is not a valid header value: {e}"),
        }
    }
}

/// Repairs authorization failures through the refresh coordinator and replays once
pub struct RefreshInterceptor {
    coordinator: Arc<RefreshCoordinator>,
}

impl RefreshInterceptor {
    pub const fn new(coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ResponseInterceptor for RefreshInterceptor {
    async fn intercept(
        &self,
        client: &SessionClient,
        request: &ApiRequest,
        outcome: Result<ApiResponse, ClientError>,
    ) -> Result<ApiResponse, ClientError> {
        let error = match outcome {
            Ok(response) => return Ok(response),
            Err(error) if !error.is_unauthorized() => return Err(error),
            Err(error) => error,
        };

        let replay = self.coordinator.recover(request, error).await?;
        debug!(
            method = %replay.method(),
            path = replay.path(),
            "replaying request with refreshed credentials"
        );
        client.dispatch(replay).await
    }
}
