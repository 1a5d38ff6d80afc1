//! HTTP plumbing shared by the Ark lister and the warts reader

use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::error::{IngestError, Result};

/// Upper bound on a single HTTP call
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Basic auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Build a client with the given per-call timeout
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| IngestError::http("client", e))
}

/// GET `url`, failing on non-success statuses
pub(crate) async fn get(
    client: &reqwest::Client,
    url: &str,
    credentials: Option<&Credentials>,
) -> Result<reqwest::Response> {
    let mut request = client.get(url);
    if let Some(credentials) = credentials {
        request = request.basic_auth(&credentials.username, Some(credentials.password()));
    }

    let response = request
        .send()
        .await
        .map_err(|e| IngestError::http(url, e))?;

    let status = response.status();
    debug!(url = url, status = status.as_u16(), "GET");
    if !status.is_success() {
        return Err(IngestError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}
