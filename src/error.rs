use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::AuthMethod;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}` for {method} authentication")]
    MissingField {
        method: AuthMethod,
        field: &'static str,
    },

    #[error("{provider} is unreachable: {source}")]
    ProviderUnreachable {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} rejected the credentials (http status {status}): {body}")]
    AuthenticationRejected {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed response from {provider}: {message}")]
    MalformedProviderResponse {
        provider: &'static str,
        message: String,
        body: String,
    },

    #[error("failed to launch server `{program}`: {source}")]
    ServerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server exited before becoming ready ({status})")]
    ServerExited { status: ExitStatus },

    #[error("server did not become ready within {timeout:?}")]
    ServerStartupTimeout { timeout: Duration },

    #[error("server at {url} is unreachable: {source}")]
    ServerUnreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server rejected the token (http status {status}): {body}")]
    TokenRejected { status: u16, body: String },

    #[error("server returned http status {status}: {body}")]
    UnexpectedServerStatus { status: u16, body: String },

    #[error("malformed response from server: {message}")]
    MalformedServerResponse { message: String, body: String },

    #[error("interrupted by termination signal")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid header: {name}={value}")]
    InvalidHeader { name: String, value: String },
}

/// Broad failure category, used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidInput,
    Authentication,
    Verification,
    Interrupted,
    Internal,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorClass::Internal => 1,
            ErrorClass::InvalidInput => 2,
            ErrorClass::Authentication => 3,
            ErrorClass::Verification => 4,
            ErrorClass::Interrupted => 130,
        }
    }
}

impl ValidationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ValidationError::MissingField { .. } => ErrorClass::InvalidInput,
            ValidationError::ProviderUnreachable { .. }
            | ValidationError::AuthenticationRejected { .. }
            | ValidationError::MalformedProviderResponse { .. } => ErrorClass::Authentication,
            ValidationError::ServerSpawn { .. }
            | ValidationError::ServerExited { .. }
            | ValidationError::ServerStartupTimeout { .. }
            | ValidationError::ServerUnreachable { .. }
            | ValidationError::TokenRejected { .. }
            | ValidationError::UnexpectedServerStatus { .. }
            | ValidationError::MalformedServerResponse { .. } => ErrorClass::Verification,
            ValidationError::Interrupted => ErrorClass::Interrupted,
            ValidationError::Io(_)
            | ValidationError::Http(_)
            | ValidationError::Url(_)
            | ValidationError::InvalidHeader { .. } => ErrorClass::Internal,
        }
    }
}
