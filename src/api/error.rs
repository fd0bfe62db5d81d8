use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::ValidationError;

/// Failure reported to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    MissingBearer,

    #[error("{0}")]
    Unauthorized(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Bearer")],
            Json(json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

/// Why one provider could not vouch for a token.
#[derive(Debug, Error)]
pub(crate) enum CheckError {
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Provider(#[from] ValidationError),

    #[error("{0}")]
    Claims(String),
}
