use url::Url;

use crate::{TokenRequest, TokenRequestFormat, ValidationError};

const TOKEN_PATH: &str = "/auth/v1/token";
const USER_PATH: &str = "/auth/v1/user";

pub const PROVIDER_ID: &str = "supabase";

/// Supabase GoTrue endpoints for one project.
#[derive(Debug, Clone)]
pub struct SupabaseProvider {
    url: String,
    api_key: String,
}

impl SupabaseProvider {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn token_url(&self) -> Result<String, ValidationError> {
        let mut url = Url::parse(&format!("{}{TOKEN_PATH}", self.url))?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        Ok(url.to_string())
    }

    pub fn user_url(&self) -> String {
        format!("{}{USER_PATH}", self.url)
    }

    pub fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenRequest, ValidationError> {
        Ok(
            TokenRequest::new(PROVIDER_ID, self.token_url()?, TokenRequestFormat::Json)
                .with_header("apikey", &self.api_key)
                .with_param("email", email)
                .with_param("password", password),
        )
    }
}
