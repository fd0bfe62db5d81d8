use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// Email and password against the Supabase password grant.
    DirectPassword,
    /// Keycloak resource-owner password grant.
    IdentityProviderPassword,
    /// Keycloak client-credentials grant.
    IdentityProviderClientCredentials,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 3] = [
        AuthMethod::DirectPassword,
        AuthMethod::IdentityProviderPassword,
        AuthMethod::IdentityProviderClientCredentials,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuthMethod::DirectPassword => "supabase",
            AuthMethod::IdentityProviderPassword => "keycloak-user",
            AuthMethod::IdentityProviderClientCredentials => "keycloak-client",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AuthMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == value)
            .ok_or_else(|| {
                format!("unknown auth method `{value}` (expected supabase, keycloak-user or keycloak-client)")
            })
    }
}

/// Raw token endpoint payload shared by Supabase and Keycloak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

const REDACTED_PREFIX_LEN: usize = 8;
const REDACTED_MIN_LEN: usize = 4 * REDACTED_PREFIX_LEN;

/// Bearer token obtained for a single validation run.
#[derive(Clone)]
pub struct Token {
    access_token: String,
    token_type: Option<String>,
    issued_at: SystemTime,
    expires_in: Option<Duration>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: None,
            issued_at: SystemTime::now(),
            expires_in: None,
        }
    }

    pub fn from_response(response: TokenResponse, issued_at: SystemTime) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            issued_at,
            expires_in: response.expires_in.map(Duration::from_secs),
        }
    }

    pub fn secret(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_in.map(|lifetime| self.issued_at + lifetime)
    }

    /// Short prefix safe to show in logs. Tokens under 32 characters are
    /// masked entirely.
    pub fn redacted(&self) -> String {
        if self.access_token.chars().count() < REDACTED_MIN_LEN {
            return "[redacted]".to_string();
        }
        let prefix: String = self.access_token.chars().take(REDACTED_PREFIX_LEN).collect();
        format!("{prefix}…")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &self.redacted())
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Identity reported by the `/whoami` endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityResult {
    pub subject: String,
    pub email: Option<String>,
    pub authentication_method: Option<String>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub roles: Vec<Role>,
}

impl IdentityResult {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_method_round_trips_through_cli_names() {
        for method in AuthMethod::ALL {
            assert_eq!(method.as_str().parse::<AuthMethod>(), Ok(method));
        }
        assert!("oauth".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn token_debug_hides_secret() {
        let token = Token::new("eyJhbGciOiJSUzI1NiJ9.payload.signature");
        let debug = format!("{token:?}");
        assert!(!debug.contains("payload.signature"));
        assert!(debug.contains("eyJhbGci"));
    }

    #[test]
    fn short_tokens_are_fully_masked() {
        for secret in ["abc", "12345678", "opaque-session-tok"] {
            let redacted = Token::new(secret).redacted();
            assert_eq!(redacted, "[redacted]");
            assert!(!format!("{:?}", Token::new(secret)).contains(secret));
        }
    }

    #[test]
    fn token_expiry_comes_from_response() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "abc",
            "token_type": "bearer",
            "expires_in": 300,
            "user": {"id": "u1"}
        }))
        .unwrap();
        let issued_at = SystemTime::UNIX_EPOCH;
        let token = Token::from_response(response, issued_at);

        assert_eq!(token.secret(), "abc");
        assert_eq!(token.token_type(), Some("bearer"));
        assert_eq!(
            token.expires_at(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(300))
        );
    }
}
