#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestFormat {
    Json,
    Form,
}

/// A fully described token request for one grant against one provider.
#[derive(Clone)]
pub struct TokenRequest {
    pub provider: &'static str,
    pub url: String,
    pub format: TokenRequestFormat,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
}

impl TokenRequest {
    pub fn new(provider: &'static str, url: impl Into<String>, format: TokenRequestFormat) -> Self {
        Self {
            provider,
            url: url.into(),
            format,
            headers: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param == key)
            .map(|(_, value)| value.as_str())
    }
}

// Parameter values include passwords and client secrets.
impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.params.iter().map(|(key, _)| key.as_str()).collect();
        f.debug_struct("TokenRequest")
            .field("provider", &self.provider)
            .field("url", &self.url)
            .field("format", &self.format)
            .field("params", &keys)
            .finish_non_exhaustive()
    }
}
