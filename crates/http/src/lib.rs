//! Warden HTTP client
//!
//! An intercepted client that attaches session credentials to every call,
//! transparently repairs expired access tokens with a single-flight refresh,
//! and replays the failed call exactly once.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod refresh;
pub mod request;
pub mod transport;
pub mod types;

pub use client::{SessionClient, SessionClientBuilder};
pub use config::{ClientConfig, Endpoints};
pub use error::ClientError;
pub use interceptor::{
    AuthHeaderInterceptor, RefreshInterceptor, RequestInterceptor, ResponseInterceptor,
};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse};
pub use reqwest::{Method, StatusCode};
pub use transport::{ReqwestTransport, Transport};
pub use types::PasswordCredentials;
