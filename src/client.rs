use std::time::{Duration, SystemTime};

use reqwest::{
    Client, RequestBuilder,
    header::{HeaderName, HeaderValue},
};
use tracing::{debug, info};

use crate::{
    Credentials, KeycloakRealm, SupabaseProvider, Token, TokenRequest, TokenRequestFormat,
    TokenResponse, ValidationError,
};

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct AuthClientConfig {
    pub supabase: SupabaseProvider,
    pub keycloak: KeycloakRealm,
    pub timeout: Duration,
}

impl AuthClientConfig {
    pub fn new(
        supabase_url: impl Into<String>,
        supabase_key: impl Into<String>,
        keycloak_realm_url: impl Into<String>,
    ) -> Self {
        Self {
            supabase: SupabaseProvider::new(supabase_url, supabase_key),
            keycloak: KeycloakRealm::new(keycloak_realm_url),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Exchanges credentials for a bearer token. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthClientConfig,
    http: Client,
}

impl AuthClient {
    pub fn new(config: AuthClientConfig) -> Result<Self, ValidationError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn with_http_client(config: AuthClientConfig, http: Client) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &AuthClientConfig {
        &self.config
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Token, ValidationError> {
        let request = self.token_request(credentials)?;
        info!(
            method = %credentials.method(),
            principal = credentials.principal(),
            endpoint = %request.url,
            "requesting token"
        );

        let issued_at = SystemTime::now();
        let response = self.send_token_request(request).await?;
        let token = Token::from_response(response, issued_at);
        debug!(token = %token.redacted(), expires_in = ?token.expires_in(), "token issued");
        Ok(token)
    }

    fn token_request(&self, credentials: &Credentials) -> Result<TokenRequest, ValidationError> {
        match credentials {
            Credentials::DirectPassword { email, password } => {
                self.config.supabase.password_grant(email, password)
            }
            Credentials::IdentityProviderPassword {
                username,
                password,
                client_id,
                client_secret,
            } => Ok(self.config.keycloak.password_grant(
                username,
                password,
                client_id,
                client_secret.as_deref(),
            )),
            Credentials::IdentityProviderClientCredentials {
                client_id,
                client_secret,
            } => Ok(self
                .config
                .keycloak
                .client_credentials_grant(client_id, client_secret)),
        }
    }

    async fn send_token_request(
        &self,
        request: TokenRequest,
    ) -> Result<TokenResponse, ValidationError> {
        let TokenRequest {
            provider,
            url,
            format,
            headers,
            params,
        } = request;

        let mut builder = self.http.post(&url);
        builder = apply_headers(builder, &headers)?;

        let builder = match format {
            TokenRequestFormat::Json => {
                let payload: serde_json::Map<String, serde_json::Value> = params
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::String(value)))
                    .collect();
                builder.json(&payload)
            }
            TokenRequestFormat::Form => builder.form(&params),
        };

        let unreachable = |source| ValidationError::ProviderUnreachable { provider, source };
        let response = builder.send().await.map_err(unreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(unreachable)?;

        if !status.is_success() {
            return Err(ValidationError::AuthenticationRejected {
                provider,
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = match serde_json::from_str(&body) {
            Ok(token) => token,
            Err(err) => {
                return Err(ValidationError::MalformedProviderResponse {
                    provider,
                    message: err.to_string(),
                    body,
                });
            }
        };
        if token.access_token.trim().is_empty() {
            return Err(ValidationError::MalformedProviderResponse {
                provider,
                message: "access_token is empty".to_string(),
                body,
            });
        }

        Ok(token)
    }
}

fn apply_headers(
    mut builder: RequestBuilder,
    headers: &[(String, String)],
) -> Result<RequestBuilder, ValidationError> {
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ValidationError::InvalidHeader {
                name: name.clone(),
                value: "<redacted>".to_string(),
            }
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| ValidationError::InvalidHeader {
            name: name.to_string(),
            value: "<redacted>".to_string(),
        })?;
        builder = builder.header(name, value);
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::{AuthMethod, CredentialInput};

    fn client_for(server: &MockServer) -> AuthClient {
        let config = AuthClientConfig::new(
            server.base_url(),
            "anon-key",
            server.url("/realms/relife"),
        )
        .with_timeout(Duration::from_secs(2));
        AuthClient::new(config).unwrap()
    }

    fn supabase_credentials(password: &str) -> Credentials {
        Credentials::resolve(
            AuthMethod::DirectPassword,
            CredentialInput::default()
                .with_email("user@example.com")
                .with_password(password),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn supabase_password_grant_returns_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/auth/v1/token")
                    .query_param("grant_type", "password")
                    .header("apikey", "anon-key")
                    .json_body(json!({"email": "user@example.com", "password": "secret"}));
                then.status(200).json_body(json!({
                    "access_token": "sb-token",
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "refresh_token": "refresh",
                    "user": {"id": "user-1"}
                }));
            })
            .await;

        let token = client_for(&server)
            .authenticate(&supabase_credentials("secret"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(token.secret(), "sb-token");
        assert_eq!(token.expires_in(), Some(Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_with_provider_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(400).json_body(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid login credentials"
                }));
            })
            .await;

        let result = client_for(&server)
            .authenticate(&supabase_credentials("wrong"))
            .await;

        match result {
            Err(ValidationError::AuthenticationRejected {
                provider,
                status,
                body,
            }) => {
                assert_eq!(provider, "supabase");
                assert_eq!(status, 400);
                assert!(body.contains("Invalid login credentials"));
            }
            other => panic!("expected AuthenticationRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn keycloak_client_credentials_posts_to_realm_token_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/realms/relife/protocol/openid-connect/token")
                    .header("content-type", "application/x-www-form-urlencoded");
                then.status(200).json_body(json!({
                    "access_token": "kc-token",
                    "expires_in": 300,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let credentials = Credentials::resolve(
            AuthMethod::IdentityProviderClientCredentials,
            CredentialInput::default()
                .with_client_id("relife-api")
                .with_client_secret("s3cret"),
        )
        .unwrap();

        let token = client_for(&server).authenticate(&credentials).await.unwrap();

        mock.assert_async().await;
        assert_eq!(token.secret(), "kc-token");
    }

    #[tokio::test]
    async fn success_without_access_token_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/realms/relife/protocol/openid-connect/token");
                then.status(200).json_body(json!({"token_type": "Bearer"}));
            })
            .await;

        let credentials = Credentials::resolve(
            AuthMethod::IdentityProviderPassword,
            CredentialInput::default()
                .with_username("alice")
                .with_password("secret")
                .with_client_id("relife-api"),
        )
        .unwrap();

        let result = client_for(&server).authenticate(&credentials).await;
        assert!(matches!(
            result,
            Err(ValidationError::MalformedProviderResponse { provider: "keycloak", .. })
        ));
    }

    #[tokio::test]
    async fn empty_access_token_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/auth/v1/token");
                then.status(200)
                    .json_body(json!({"access_token": "", "token_type": "bearer"}));
            })
            .await;

        let result = client_for(&server)
            .authenticate(&supabase_credentials("secret"))
            .await;
        match result {
            Err(ValidationError::MalformedProviderResponse {
                provider, message, ..
            }) => {
                assert_eq!(provider, "supabase");
                assert_eq!(message, "access_token is empty");
            }
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let base = format!("http://127.0.0.1:{port}");
        let config = AuthClientConfig::new(&base, "anon-key", format!("{base}/realms/relife"))
            .with_timeout(Duration::from_secs(2));
        let client = AuthClient::new(config).unwrap();

        let result = client.authenticate(&supabase_credentials("secret")).await;
        assert!(matches!(
            result,
            Err(ValidationError::ProviderUnreachable { provider: "supabase", .. })
        ));
    }
}
