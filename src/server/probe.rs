use std::time::Duration;

use reqwest::Client;
use tracing::trace;

use crate::ValidationError;

const HEALTH_PATH: &str = "/health";

/// Liveness check against a freshly launched instance.
#[derive(Debug, Clone)]
pub(super) struct HealthProbe {
    http: Client,
    url: String,
}

impl HealthProbe {
    pub(super) fn new(base_url: &str, timeout: Duration) -> Result<Self, ValidationError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: format!("{base_url}{HEALTH_PATH}"),
        })
    }

    /// Any answer short of a server error means the listener is up.
    pub(super) async fn check(&self) -> bool {
        match self.http.get(&self.url).send().await {
            Ok(response) => {
                trace!(status = %response.status(), "health probe answered");
                !response.status().is_server_error()
            }
            Err(err) => {
                trace!(error = %err, "health probe failed");
                false
            }
        }
    }
}

pub(super) fn free_port(host: &str) -> Result<u16, ValidationError> {
    let listener = std::net::TcpListener::bind((host, 0))?;
    Ok(listener.local_addr()?.port())
}
