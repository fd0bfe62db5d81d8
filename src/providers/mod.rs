pub mod keycloak;
mod provider;
pub mod supabase;

pub use keycloak::KeycloakRealm;
pub use provider::{TokenRequest, TokenRequestFormat};
pub use supabase::SupabaseProvider;
