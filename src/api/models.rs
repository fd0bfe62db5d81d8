use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::providers::keycloak;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMethod {
    Supabase,
    Keycloak,
}

/// Realm role as returned by the Keycloak admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeycloakRole {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub composite: Option<bool>,
    #[serde(rename = "clientRole", default)]
    pub client_role: Option<bool>,
    #[serde(rename = "containerId", default)]
    pub container_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub provider: String,
    pub id: String,
}

/// User as seen by the API, whichever provider vouched for the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversalUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    #[serde(default)]
    pub identities: Vec<UserIdentity>,
}

impl UniversalUser {
    pub fn from_keycloak_claims(subject: String, email: Option<String>, issuer: String) -> Self {
        let mut user_metadata = Map::new();
        user_metadata.insert("provider_id".to_string(), Value::String(subject.clone()));
        user_metadata.insert("iss".to_string(), Value::String(issuer));
        Self {
            identities: vec![UserIdentity {
                provider: keycloak::PROVIDER_ID.to_string(),
                id: subject.clone(),
            }],
            id: subject,
            email,
            user_metadata,
        }
    }

    pub fn is_keycloak_provider(&self) -> bool {
        self.identities
            .iter()
            .any(|identity| identity.provider == keycloak::PROVIDER_ID)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Body of a successful `/whoami` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user: UniversalUser,
    pub authentication_method: AuthenticationMethod,
    pub keycloak_roles: Option<Vec<KeycloakRole>>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, name: &str) -> bool {
        self.keycloak_roles
            .iter()
            .flatten()
            .any(|role| role.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keycloak_user_carries_provider_metadata() {
        let user = UniversalUser::from_keycloak_claims(
            "kc-1".to_string(),
            None,
            "https://idp.example.com/realms/relife".to_string(),
        );
        assert!(user.is_keycloak_provider());
        assert_eq!(user.metadata_str("provider_id"), Some("kc-1"));
        assert_eq!(
            user.metadata_str("iss"),
            Some("https://idp.example.com/realms/relife")
        );
    }

    #[test]
    fn roles_use_keycloak_field_names() {
        let role: KeycloakRole = serde_json::from_value(serde_json::json!({
            "id": "r1",
            "name": "relife_admin",
            "composite": false,
            "clientRole": false,
            "containerId": "realm-1"
        }))
        .unwrap();
        assert_eq!(role.container_id.as_deref(), Some("realm-1"));

        let user = AuthenticatedUser {
            user: UniversalUser::from_keycloak_claims("kc-1".into(), None, "iss".into()),
            authentication_method: AuthenticationMethod::Keycloak,
            keycloak_roles: Some(vec![role]),
        };
        assert!(user.has_role("relife_admin"));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["authentication_method"], "keycloak");
        assert_eq!(json["keycloak_roles"][0]["clientRole"], false);
    }
}
