//! Remote confirmation that a bearer token belongs to an identifier.
//!
//! The default [`HttpVerifier`] calls the OneAccount verification endpoint.
//! There is deliberately no retry: a staged entry is consumed before
//! verification runs, so the outcome of the single call is final.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::Config;
use crate::error::{VerifyError, VerifyResult};

/// Confirms with a remote authority that `token` was issued for `identifier`.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, token: &str, identifier: &str) -> VerifyResult<()>;
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
}

/// Verifier posting to the OneAccount widget verification endpoint.
#[derive(Clone)]
pub struct HttpVerifier {
    client: Client,
    verify_url: String,
}

impl HttpVerifier {
    /// Create a verifier with the timeouts and pool settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()?;

        Ok(Self::with_client(client, config.verify_url.clone()))
    }

    /// Use an already configured client.
    #[must_use]
    pub fn with_client(client: Client, verify_url: impl Into<String>) -> Self {
        Self {
            client,
            verify_url: verify_url.into(),
        }
    }

    /// Endpoint this verifier posts to.
    #[must_use]
    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn verify(&self, token: &str, identifier: &str) -> VerifyResult<()> {
        let body = serde_json::json!({ "uuid": identifier });

        let response = self
            .client
            .post(&self.verify_url)
            .header(AUTHORIZATION, format!("BEARER {token}"))
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "Verification endpoint refused request");
            return Err(VerifyError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let parsed: VerifyResponse = serde_json::from_slice(&bytes)?;
        if !parsed.success {
            return Err(VerifyError::Rejected);
        }

        Ok(())
    }
}

impl std::fmt::Debug for HttpVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpVerifier").field("verify_url", &self.verify_url).finish()
    }
}
