//! Authentication-integration validator for a service that trusts Supabase
//! and a Keycloak realm.
//!
//! A run resolves credentials for one of three flows, obtains a bearer token,
//! starts a throwaway instance of the service API, calls its `/whoami`
//! endpoint with the token and always stops the instance afterwards. The
//! [`api`] module is that service API.

pub mod api;
mod client;
mod config;
mod credentials;
mod error;
pub mod logging;
mod orchestrator;
mod providers;
pub mod report;
mod server;
mod signal;
mod types;
mod verify;

pub use client::{AuthClient, AuthClientConfig, DEFAULT_PROVIDER_TIMEOUT};
pub use config::{DEFAULT_ADMIN_ROLE_NAME, DEFAULT_KEYCLOAK_REALM_URL, Settings};
pub use credentials::{CredentialInput, Credentials};
pub use error::{ErrorClass, ValidationError};
pub use orchestrator::{Failure, RunState, Stage, ValidationReport, Validator};
pub use providers::{KeycloakRealm, SupabaseProvider, TokenRequest, TokenRequestFormat};
pub use server::{ServerCommand, ServerHandle, ServerManager, ServerManagerConfig, StopOutcome};
pub use signal::shutdown_signal;
pub use types::{AuthMethod, IdentityResult, Role, Token, TokenResponse};
pub use verify::{DEFAULT_VERIFY_TIMEOUT, VerificationClient};
