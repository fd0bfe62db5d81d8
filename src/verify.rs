use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{IdentityResult, Role, ServerHandle, Token, ValidationError};

pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

const WHOAMI_PATH: &str = "/whoami";

#[derive(Debug, Deserialize)]
struct WhoamiPayload {
    user: WhoamiUser,
    #[serde(default)]
    authentication_method: Option<String>,
    #[serde(default)]
    keycloak_roles: Option<Vec<Role>>,
}

#[derive(Debug, Deserialize)]
struct WhoamiUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Calls the identity-introspection endpoint of a running instance.
#[derive(Debug, Clone)]
pub struct VerificationClient {
    http: Client,
}

impl VerificationClient {
    pub fn new(timeout: Duration) -> Result<Self, ValidationError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }

    pub async fn whoami(
        &self,
        server: &ServerHandle,
        token: &Token,
    ) -> Result<IdentityResult, ValidationError> {
        let url = format!("{}{WHOAMI_PATH}", server.base_url());
        info!(%url, "verifying token against server");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.secret())
            .send()
            .await
            .map_err(|source| ValidationError::ServerUnreachable {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ValidationError::ServerUnreachable { url, source })?;
        debug!(%status, "whoami answered");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ValidationError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            return Err(ValidationError::UnexpectedServerStatus {
                status: status.as_u16(),
                body,
            });
        }

        parse_identity(body)
    }
}

fn parse_identity(body: String) -> Result<IdentityResult, ValidationError> {
    let payload: WhoamiPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(err) => {
            return Err(ValidationError::MalformedServerResponse {
                message: err.to_string(),
                body,
            });
        }
    };

    if payload.user.id.is_empty() {
        return Err(ValidationError::MalformedServerResponse {
            message: "user id is empty".to_string(),
            body,
        });
    }

    Ok(IdentityResult {
        subject: payload.user.id,
        email: payload.user.email,
        authentication_method: payload.authentication_method,
        attributes: payload.user.user_metadata,
        roles: payload.keycloak_roles.unwrap_or_default(),
    })
}
