use crate::{AuthMethod, ValidationError};

/// Identifiers supplied by the user, before any method-specific checks.
#[derive(Debug, Clone, Default)]
pub struct CredentialInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl CredentialInput {
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }
}

/// Exactly the parameters one authentication flow needs.
#[derive(Clone)]
pub enum Credentials {
    DirectPassword {
        email: String,
        password: String,
    },
    IdentityProviderPassword {
        username: String,
        password: String,
        client_id: String,
        client_secret: Option<String>,
    },
    IdentityProviderClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

impl Credentials {
    pub fn resolve(method: AuthMethod, input: CredentialInput) -> Result<Self, ValidationError> {
        let CredentialInput {
            email,
            password,
            username,
            client_id,
            client_secret,
        } = input;
        let missing = |field| ValidationError::MissingField { method, field };

        match method {
            AuthMethod::DirectPassword => Ok(Credentials::DirectPassword {
                email: present(email).ok_or_else(|| missing("email"))?,
                password: present(password).ok_or_else(|| missing("password"))?,
            }),
            AuthMethod::IdentityProviderPassword => Ok(Credentials::IdentityProviderPassword {
                username: present(username)
                    .or_else(|| present(email))
                    .ok_or_else(|| missing("username"))?,
                password: present(password).ok_or_else(|| missing("password"))?,
                client_id: present(client_id).ok_or_else(|| missing("client_id"))?,
                client_secret: present(client_secret),
            }),
            AuthMethod::IdentityProviderClientCredentials => {
                Ok(Credentials::IdentityProviderClientCredentials {
                    client_id: present(client_id).ok_or_else(|| missing("client_id"))?,
                    client_secret: present(client_secret)
                        .ok_or_else(|| missing("client_secret"))?,
                })
            }
        }
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            Credentials::DirectPassword { .. } => AuthMethod::DirectPassword,
            Credentials::IdentityProviderPassword { .. } => AuthMethod::IdentityProviderPassword,
            Credentials::IdentityProviderClientCredentials { .. } => {
                AuthMethod::IdentityProviderClientCredentials
            }
        }
    }

    /// Who is authenticating, for log lines. Never includes secrets.
    pub fn principal(&self) -> &str {
        match self {
            Credentials::DirectPassword { email, .. } => email,
            Credentials::IdentityProviderPassword { username, .. } => username,
            Credentials::IdentityProviderClientCredentials { client_id, .. } => client_id,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("method", &self.method())
            .field("principal", &self.principal())
            .finish_non_exhaustive()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
