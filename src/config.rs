use crate::AuthClientConfig;

pub const DEFAULT_KEYCLOAK_REALM_URL: &str = "https://relife-identity.test.ctic.es/realms/relife";
pub const DEFAULT_ADMIN_ROLE_NAME: &str = "relife_admin";

/// Service configuration shared by the validator and the API it starts.
///
/// Values are passed through as given; nothing here checks that the URLs or
/// keys are valid.
#[derive(Clone)]
pub struct Settings {
    pub supabase_url: String,
    /// Service-role key. Bypasses row level security, never sent to clients.
    pub supabase_key: String,
    pub keycloak_client_id: String,
    pub keycloak_client_secret: String,
    pub keycloak_realm_url: String,
    pub admin_role_name: String,
}

impl Settings {
    pub fn new(
        supabase_url: impl Into<String>,
        supabase_key: impl Into<String>,
        keycloak_client_id: impl Into<String>,
        keycloak_client_secret: impl Into<String>,
    ) -> Self {
        Self {
            supabase_url: supabase_url.into(),
            supabase_key: supabase_key.into(),
            keycloak_client_id: keycloak_client_id.into(),
            keycloak_client_secret: keycloak_client_secret.into(),
            keycloak_realm_url: DEFAULT_KEYCLOAK_REALM_URL.to_string(),
            admin_role_name: DEFAULT_ADMIN_ROLE_NAME.to_string(),
        }
    }

    pub fn with_keycloak_realm_url(mut self, url: impl Into<String>) -> Self {
        self.keycloak_realm_url = url.into();
        self
    }

    pub fn with_admin_role_name(mut self, name: impl Into<String>) -> Self {
        self.admin_role_name = name.into();
        self
    }

    pub fn auth_client_config(&self) -> AuthClientConfig {
        AuthClientConfig::new(
            &self.supabase_url,
            &self.supabase_key,
            &self.keycloak_realm_url,
        )
    }

    /// Environment an ephemeral instance of the API needs to run with this
    /// configuration.
    pub fn to_env(&self) -> Vec<(String, String)> {
        [
            ("SUPABASE_URL", &self.supabase_url),
            ("SUPABASE_KEY", &self.supabase_key),
            ("KEYCLOAK_CLIENT_ID", &self.keycloak_client_id),
            ("KEYCLOAK_CLIENT_SECRET", &self.keycloak_client_secret),
            ("KEYCLOAK_REALM_URL", &self.keycloak_realm_url),
            ("ADMIN_ROLE_NAME", &self.admin_role_name),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("supabase_url", &self.supabase_url)
            .field("keycloak_client_id", &self.keycloak_client_id)
            .field("keycloak_realm_url", &self.keycloak_realm_url)
            .field("admin_role_name", &self.admin_role_name)
            .finish_non_exhaustive()
    }
}
