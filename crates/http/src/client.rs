//! Session-aware API client
//!
//! `SessionClient` runs every call through the interceptor pipeline:
//! request interceptors in order, the bare transport, then response
//! interceptors in order. The default pipeline attaches credentials and
//! repairs expired access tokens.

use crate::config::{ClientConfig, Endpoints};
use crate::error::ClientError;
use crate::interceptor::{
    AuthHeaderInterceptor, RefreshInterceptor, RequestInterceptor, ResponseInterceptor,
};
use crate::refresh::RefreshCoordinator;
use crate::request::{ApiRequest, ApiResponse};
use crate::transport::{ReqwestTransport, Transport};
use futures::future::BoxFuture;
use reqwest::header::HeaderName;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;
use warden_core::{CredentialStore, Fingerprinter, SessionEvents};

struct ClientInner {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    events: SessionEvents,
    endpoints: Endpoints,
    coordinator: Arc<RefreshCoordinator>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

/// Intercepted client for one session
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<ClientInner>,
}

impl SessionClient {
    /// Client with default configuration pointed at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    /// Transport without interception; used for login, logout and refresh
    pub fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    /// Run `request` through the full pipeline.
    ///
    /// Boxed because response interceptors may re-enter it to replay.
    pub fn dispatch(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, ClientError>> {
        Box::pin(async move {
            let mut request = request;
            for interceptor in &self.inner.request_interceptors {
                interceptor.intercept(&mut request);
            }

            debug!(
                method = %request.method(),
                path = request.path(),
                retry = request.is_retry(),
                "sending request"
            );
            let mut outcome = self
                .inner
                .transport
                .send(&request)
                .await
                .and_then(ApiResponse::into_result);

            for interceptor in &self.inner.response_interceptors {
                outcome = interceptor.intercept(self, &request, outcome).await;
            }

            outcome
        })
    }

    /// Send a request and return the raw response
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.dispatch(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post(path).json(body)?;
        self.send(request).await?.json()
    }
}

/// Builder for `SessionClient`
#[derive(Default)]
pub struct SessionClientBuilder {
    config: ClientConfig,
    store: Option<CredentialStore>,
    events: Option<SessionEvents>,
    transport: Option<Arc<dyn Transport>>,
    fingerprinter: Option<Fingerprinter>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
}

impl SessionClientBuilder {
    /// Replace the whole configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Share an existing credential store
    #[must_use]
    pub fn store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn events(mut self, events: SessionEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Use a custom transport instead of reqwest
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn fingerprinter(mut self, fingerprinter: Fingerprinter) -> Self {
        self.fingerprinter = Some(fingerprinter);
        self
    }

    /// Append a request interceptor after the credential interceptor
    #[must_use]
    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptors.push(interceptor);
        self
    }

    /// Append a response interceptor after the refresh interceptor
    #[must_use]
    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptors.push(interceptor);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        self.config.validate()?;

        let fingerprint_header = HeaderName::from_bytes(self.config.fingerprint_header.as_bytes())
            .map_err(|e| {
                ClientError::Configuration(format!(
                    "invalid fingerprint header {:?}: {e}",
                    self.config.fingerprint_header
                ))
            })?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let store = self.store.unwrap_or_default();
        let events = self.events.unwrap_or_default();

        let coordinator = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            store.clone(),
            self.config.endpoints.refresh.clone(),
            events.clone(),
        ));

        let mut request_interceptors: Vec<Arc<dyn RequestInterceptor>> =
            vec![Arc::new(AuthHeaderInterceptor::new(
                store.clone(),
                self.fingerprinter.unwrap_or_default(),
                fingerprint_header,
            ))];
        request_interceptors.extend(self.request_interceptors);

        let mut response_interceptors: Vec<Arc<dyn ResponseInterceptor>> =
            vec![Arc::new(RefreshInterceptor::new(coordinator.clone()))];
        response_interceptors.extend(self.response_interceptors);

        Ok(SessionClient {
            inner: Arc::new(ClientInner {
                transport,
                store,
                events,
                endpoints: self.config.endpoints,
                coordinator,
                request_interceptors,
                response_interceptors,
            }),
        })
    }
}
