use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::KeycloakRealm;

use super::error::CheckError;
use super::models::UniversalUser;

#[derive(Debug, Deserialize)]
struct IssuerClaim {
    iss: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeycloakClaims {
    sub: Option<String>,
    email: Option<String>,
    aud: Option<Audience>,
    azp: Option<String>,
}

/// Validates a token issued directly by the configured realm.
pub(super) async fn validate_keycloak_token(
    http: &Client,
    realm: &KeycloakRealm,
    client_id: &str,
    token: &str,
) -> Result<UniversalUser, CheckError> {
    let issuer = unverified_issuer(token)?;
    if issuer != realm.issuer() {
        warn!(
            attempted_issuer = %issuer,
            expected_issuer = realm.issuer(),
            "untrusted issuer attempted"
        );
        return Err(CheckError::Claims(format!("Untrusted issuer: {issuer}")));
    }

    let header = decode_header(token)?;
    let jwks: JwkSet = http
        .get(realm.certs_url())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let jwk = match header.kid.as_deref() {
        Some(kid) => jwks.find(kid),
        None => jwks.keys.first(),
    }
    .ok_or_else(|| CheckError::Claims("no matching signing key in realm certs".to_string()))?;

    let key = DecodingKey::from_jwk(jwk)?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    let claims = decode::<KeycloakClaims>(token, &key, &validation)?.claims;

    check_client(&claims, client_id)?;

    let subject = claims
        .sub
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| CheckError::Claims("JWT missing subject claim".to_string()))?;
    debug!(%subject, "keycloak token verified");

    Ok(UniversalUser::from_keycloak_claims(
        subject,
        claims.email,
        issuer,
    ))
}

/// Reads `iss` before the signature is checked, so the expected realm can be
/// enforced up front.
fn unverified_issuer(token: &str) -> Result<String, CheckError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| CheckError::Claims("token is not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| CheckError::Claims(format!("invalid JWT payload encoding: {err}")))?;
    let claim: IssuerClaim = serde_json::from_slice(&bytes)
        .map_err(|err| CheckError::Claims(format!("invalid JWT payload: {err}")))?;
    claim
        .iss
        .ok_or_else(|| CheckError::Claims("JWT missing issuer claim".to_string()))
}

// Keycloak puts the requesting client in `azp`; `aud` may name it too.
fn check_client(claims: &KeycloakClaims, client_id: &str) -> Result<(), CheckError> {
    let in_audience = claims
        .aud
        .as_ref()
        .is_some_and(|aud| aud.contains(client_id));
    let authorized_party = claims.azp.as_deref() == Some(client_id);

    if in_audience || authorized_party {
        Ok(())
    } else {
        Err(CheckError::Claims(format!(
            "Token not intended for this client. Expected client_id: {client_id}, found audience: {:?}, authorized party: {:?}",
            claims.aud, claims.azp
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn reads_issuer_without_verifying() {
        let token = fake_jwt(serde_json::json!({"iss": "https://idp.example.com/realms/relife"}));
        assert_eq!(
            unverified_issuer(&token).unwrap(),
            "https://idp.example.com/realms/relife"
        );
    }

    #[test]
    fn opaque_tokens_are_not_jwts() {
        assert!(matches!(
            unverified_issuer("opaque-token"),
            Err(CheckError::Claims(_))
        ));
    }

    #[tokio::test]
    async fn foreign_issuer_is_rejected_before_fetching_keys() {
        let token = fake_jwt(serde_json::json!({"iss": "https://evil.example.com/realms/relife"}));
        let realm = KeycloakRealm::new("https://idp.example.com/realms/relife");

        let result = validate_keycloak_token(&Client::new(), &realm, "relife-api", &token).await;
        match result {
            Err(CheckError::Claims(message)) => assert!(message.contains("Untrusted issuer")),
            other => panic!("expected untrusted issuer, got {other:?}"),
        }
    }

    #[test]
    fn client_may_appear_in_audience_list_or_azp() {
        let claims: KeycloakClaims = serde_json::from_value(serde_json::json!({
            "aud": ["account", "relife-api"]
        }))
        .unwrap();
        assert!(check_client(&claims, "relife-api").is_ok());

        let claims: KeycloakClaims = serde_json::from_value(serde_json::json!({
            "aud": "account",
            "azp": "relife-api"
        }))
        .unwrap();
        assert!(check_client(&claims, "relife-api").is_ok());

        let claims: KeycloakClaims =
            serde_json::from_value(serde_json::json!({"aud": "account", "azp": "other"})).unwrap();
        assert!(check_client(&claims, "relife-api").is_err());
    }
}
