//! Login, logout and token verification

use crate::client::SessionClient;
use crate::error::ClientError;
use crate::request::ApiRequest;
use crate::types::{LoginResponse, RefreshRequest};
use serde::Serialize;
use tracing::{debug, info, warn};
use warden_core::{SessionEvent, TokenPair};

impl SessionClient {
    /// Exchange credentials for a token pair and start the session.
    ///
    /// Sent over the bare transport: a rejected login must never trigger a
    /// refresh of whatever session was there before.
    pub async fn login<C>(&self, credentials: &C) -> Result<TokenPair, ClientError>
    where
        C: Serialize + ?Sized + Sync,
    {
        let request = ApiRequest::post(&self.endpoints().login).json(credentials)?;
        let response = self.transport().send(&request).await?.into_result()?;
        let tokens: LoginResponse = response.json()?;

        let pair = TokenPair::new(tokens.access, tokens.refresh);
        self.store().set(pair.clone());
        info!("login succeeded");
        self.events().emit(SessionEvent::LoggedIn);

        Ok(pair)
    }

    /// Probe whether the current access token is accepted.
    ///
    /// Runs through the pipeline, so an expired access token is refreshed
    /// before this reports failure.
    pub async fn verify(&self) -> Result<(), ClientError> {
        self.send(ApiRequest::get(&self.endpoints().verify))
            .await
            .map(|_| ())
    }

    /// End the session.
    ///
    /// The backend is asked to revoke the refresh token on a best-effort
    /// basis; local credentials are cleared whatever it answers.
    pub async fn logout(&self) {
        if let Some(pair) = self.store().get() {
            match self.revoke(&pair).await {
                Ok(()) => debug!("refresh token revoked"),
                Err(e) => warn!("logout request failed, clearing session anyway: {e}"),
            }
        }

        self.store().clear();
        info!("logged out");
        self.events().emit(SessionEvent::LoggedOut);
    }

    async fn revoke(&self, pair: &TokenPair) -> Result<(), ClientError> {
        let mut request = ApiRequest::post(&self.endpoints().logout).json(&RefreshRequest {
            refresh: &pair.refresh,
        })?;
        if let Err(e) = request.set_bearer(&pair.access) {
            debug!("sending logout without bearer: {e}");
        }

        self.transport().send(&request).await?.into_result()?;
        Ok(())
    }
}
