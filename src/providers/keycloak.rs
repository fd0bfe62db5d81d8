use crate::{TokenRequest, TokenRequestFormat};

const TOKEN_PATH: &str = "/protocol/openid-connect/token";
const CERTS_PATH: &str = "/protocol/openid-connect/certs";

pub const PROVIDER_ID: &str = "keycloak";

/// Endpoints of a single Keycloak realm, derived from its base URL
/// (e.g. `https://idp.example.com/realms/relife`).
#[derive(Debug, Clone)]
pub struct KeycloakRealm {
    realm_url: String,
}

impl KeycloakRealm {
    pub fn new(realm_url: impl Into<String>) -> Self {
        Self {
            realm_url: realm_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Realm URL as it appears in the `iss` claim of tokens it issues.
    pub fn issuer(&self) -> &str {
        &self.realm_url
    }

    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.realm_url)
    }

    pub fn certs_url(&self) -> String {
        format!("{}{CERTS_PATH}", self.realm_url)
    }

    pub fn realm_role_mappings_url(&self, user_id: &str) -> String {
        let admin_base = self.realm_url.replacen("/realms", "/admin/realms", 1);
        format!("{admin_base}/users/{user_id}/role-mappings/realm")
    }

    pub fn password_grant(
        &self,
        username: &str,
        password: &str,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> TokenRequest {
        let request = self
            .grant("password", client_id)
            .with_param("username", username)
            .with_param("password", password);
        match client_secret {
            Some(secret) => request.with_param("client_secret", secret),
            None => request,
        }
    }

    pub fn client_credentials_grant(&self, client_id: &str, client_secret: &str) -> TokenRequest {
        self.grant("client_credentials", client_id)
            .with_param("client_secret", client_secret)
    }

    fn grant(&self, grant_type: &str, client_id: &str) -> TokenRequest {
        TokenRequest::new(PROVIDER_ID, self.token_url(), TokenRequestFormat::Form)
            .with_header("Accept", "application/json")
            .with_param("grant_type", grant_type)
            .with_param("client_id", client_id)
    }
}
