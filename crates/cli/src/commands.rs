//! CLI commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use std::sync::Arc;
use tracing::info;
use warden_core::generate_fingerprint;
use warden_http::{ApiRequest, Method, PasswordCredentials};
use warden_session::{AuthSession, GuardState, SessionConfig};

use crate::navigator::ConsoleNavigator;

#[derive(Subcommand)]
pub enum Commands {
    /// Print this device's fingerprint
    Fingerprint,

    /// Log in, then log out again
    Login {
        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Log in and probe whether the session is accepted
    Verify {
        #[command(flatten)]
        auth: AuthArgs,
    },

    /// Log in and call a protected endpoint
    Call {
        #[command(flatten)]
        auth: AuthArgs,

        /// Request path, e.g. /accounts
        path: String,

        #[arg(short = 'X', long, default_value = "get")]
        method: HttpMethod,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[derive(Args)]
pub struct AuthArgs {
    #[arg(short, long, env = "WARDEN_USERNAME")]
    username: String,

    #[arg(long, env = "WARDEN_PASSWORD", hide_env_values = true)]
    password: String,
}

impl AuthArgs {
    fn credentials(&self) -> PasswordCredentials {
        PasswordCredentials::new(&self.username, &self.password)
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

impl Commands {
    pub async fn execute(self, config: SessionConfig) -> Result<()> {
        match self {
            Self::Fingerprint => {
                println!("{}", generate_fingerprint());
                Ok(())
            }
            Self::Login { auth } => {
                let session = open_session(&config, &auth).await?;
                println!("Logged in as {}", auth.username);
                session.logout().await;
                Ok(())
            }
            Self::Verify { auth } => {
                let session = open_session(&config, &auth).await?;
                let state = session.guard().enter("verify").await;
                session.logout().await;
                match state {
                    GuardState::Authorized => {
                        println!("Session is valid");
                        Ok(())
                    }
                    other => anyhow::bail!("session rejected: {other:?}"),
                }
            }
            Self::Call {
                auth,
                path,
                method,
                data,
            } => {
                let session = open_session(&config, &auth).await?;
                let result = call(&session, path, method, data.as_deref()).await;
                session.logout().await;
                println!("{}", result?);
                Ok(())
            }
        }
    }
}

async fn open_session(config: &SessionConfig, auth: &AuthArgs) -> Result<AuthSession> {
    let session = AuthSession::new(config, Arc::new(ConsoleNavigator))?;
    session
        .login(&auth.credentials())
        .await
        .context("login failed")?;
    info!(username = %auth.username, "logged in");
    Ok(session)
}

async fn call(
    session: &AuthSession,
    path: String,
    method: HttpMethod,
    data: Option<&str>,
) -> Result<String> {
    let mut request = ApiRequest::new(method.into(), path);
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("request body is not valid JSON")?;
        request = request.json(&body)?;
    }

    let response = session.send(request).await?;
    Ok(response.text())
}
