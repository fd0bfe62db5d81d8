use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    AuthClient, AuthClientConfig, Credentials, KeycloakRealm, Settings, SupabaseProvider,
};

use super::error::{ApiError, CheckError};
use super::jwt::validate_keycloak_token;
use super::models::{
    AuthenticatedUser, AuthenticationMethod, KeycloakRole, UniversalUser, UserIdentity,
};

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Map<String, Value>>,
    #[serde(default)]
    identities: Option<Vec<UserIdentity>>,
}

impl From<SupabaseUser> for UniversalUser {
    fn from(user: SupabaseUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            user_metadata: user.user_metadata.unwrap_or_default(),
            identities: user.identities.unwrap_or_default(),
        }
    }
}

/// Decides who a bearer token belongs to: Supabase first, then a direct
/// Keycloak JWT check.
#[derive(Debug, Clone)]
pub struct Authenticator {
    settings: Settings,
    supabase: SupabaseProvider,
    realm: KeycloakRealm,
    http: Client,
}

impl Authenticator {
    pub fn new(settings: Settings, http: Client) -> Self {
        Self {
            supabase: SupabaseProvider::new(&settings.supabase_url, &settings.supabase_key),
            realm: KeycloakRealm::new(&settings.keycloak_realm_url),
            settings,
            http,
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, ApiError> {
        let supabase_error = match self.supabase_user(token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "user authenticated via supabase");
                return Ok(AuthenticatedUser {
                    user,
                    authentication_method: AuthenticationMethod::Supabase,
                    keycloak_roles: None,
                });
            }
            Err(err) => err,
        };
        debug!(error = %supabase_error, "supabase authentication failed");

        let user = validate_keycloak_token(
            &self.http,
            &self.realm,
            &self.settings.keycloak_client_id,
            token,
        )
        .await
        .map_err(|keycloak_error| {
            debug!(error = %keycloak_error, "keycloak authentication failed");
            ApiError::Unauthorized(format!(
                "Supabase and Keycloak authentication failed: Supabase error: '{supabase_error}', Keycloak error: '{keycloak_error}'"
            ))
        })?;
        debug!(user_id = %user.id, "user authenticated via keycloak");

        Ok(AuthenticatedUser {
            user,
            authentication_method: AuthenticationMethod::Keycloak,
            keycloak_roles: None,
        })
    }

    async fn supabase_user(&self, token: &str) -> Result<UniversalUser, CheckError> {
        let response = self
            .http
            .get(self.supabase.user_url())
            .header("apikey", self.supabase.api_key())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CheckError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let user: SupabaseUser = response.json().await?;
        Ok(user.into())
    }

    /// Realm roles for users linked to Keycloak. Lookup problems are logged
    /// and yield no roles.
    pub async fn realm_roles(&self, user: &UniversalUser) -> Vec<KeycloakRole> {
        if !user.is_keycloak_provider() {
            return Vec::new();
        }

        let (Some(provider_id), Some(issuer)) =
            (user.metadata_str("provider_id"), user.metadata_str("iss"))
        else {
            warn!(user_id = %user.id, "missing keycloak metadata for user");
            return Vec::new();
        };

        match self.fetch_realm_roles(issuer, provider_id).await {
            Ok(roles) => roles,
            Err(err) => {
                warn!(user_id = %provider_id, error = %err, "failed to fetch keycloak roles for user");
                Vec::new()
            }
        }
    }

    async fn fetch_realm_roles(
        &self,
        issuer: &str,
        user_id: &str,
    ) -> Result<Vec<KeycloakRole>, CheckError> {
        let config = AuthClientConfig::new(
            &self.settings.supabase_url,
            &self.settings.supabase_key,
            issuer,
        );
        let realm = config.keycloak.clone();
        let admin = AuthClient::with_http_client(config, self.http.clone());
        let admin_token = admin
            .authenticate(&Credentials::IdentityProviderClientCredentials {
                client_id: self.settings.keycloak_client_id.clone(),
                client_secret: self.settings.keycloak_client_secret.clone(),
            })
            .await?;

        let url = realm.realm_role_mappings_url(user_id);
        debug!(%user_id, %url, "requesting roles for user");

        let roles = self
            .http
            .get(&url)
            .bearer_auth(admin_token.secret())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(roles)
    }
}
