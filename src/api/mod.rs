//! The service API surface exercised by the validator: `/health` and the
//! `/whoami` identity-introspection endpoint.

mod auth;
mod error;
mod http;
mod jwt;
mod models;

use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;

use axum::{Router, routing::get};
use reqwest::Client;
use tokio::net::TcpListener as TokioTcpListener;
use tracing::info;

use crate::{DEFAULT_PROVIDER_TIMEOUT, Settings, ValidationError};

pub use auth::Authenticator;
pub use error::ApiError;
pub use models::{
    AuthenticatedUser, AuthenticationMethod, KeycloakRole, UniversalUser, UserIdentity,
};

use http::{ApiState, fallback_handler, health_handler, whoami_handler};

#[derive(Debug, Clone)]
pub struct ApiServer {
    authenticator: Arc<Authenticator>,
}

impl ApiServer {
    pub fn new(settings: Settings) -> Result<Self, ValidationError> {
        let http = Client::builder().timeout(DEFAULT_PROVIDER_TIMEOUT).build()?;
        Ok(Self {
            authenticator: Arc::new(Authenticator::new(settings, http)),
        })
    }

    pub fn router(&self) -> Router {
        let state = ApiState {
            authenticator: self.authenticator.clone(),
        };
        Router::new()
            .route("/health", get(health_handler))
            .route("/whoami", get(whoami_handler))
            .fallback(fallback_handler)
            .with_state(state)
    }

    pub fn bind(host: &str, port: u16) -> Result<TcpListener, ValidationError> {
        TcpListener::bind((host, port)).map_err(ValidationError::from)
    }

    /// Serves on `listener` until `shutdown` resolves, then drains in-flight
    /// requests.
    pub async fn serve_with<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ValidationError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        listener.set_nonblocking(true)?;
        let listener = TokioTcpListener::from_std(listener)?;
        info!(addr = %listener.local_addr()?, "api listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("api stopped");
        Ok(())
    }
}
