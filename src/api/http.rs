use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde_json::{Value, json};

use super::auth::Authenticator;
use super::error::ApiError;
use super::models::AuthenticatedUser;

#[derive(Clone)]
pub(super) struct ApiState {
    pub(super) authenticator: Arc<Authenticator>,
}

pub(super) async fn health_handler() -> Json<Value> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    Json(json!({ "status": "healthy", "timestamp": timestamp }))
}

pub(super) async fn whoami_handler(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<AuthenticatedUser>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::MissingBearer)?;
    let mut user = state.authenticator.authenticate(token).await?;
    user.keycloak_roles = Some(state.authenticator.realm_roles(&user.user).await);
    Ok(Json(user))
}

pub(super) async fn fallback_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
