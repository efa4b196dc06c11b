//! Bearer token acquisition for the compute API
//!
//! A fresh token is fetched at the start of every invocation; nothing is
//! cached between invocations.

use crate::config::Config;
use crate::error::HandlerError;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// OAuth scope granting read/write access to compute resources
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Short-lived bearer credential
#[derive(Clone)]
pub struct AuthToken {
    access_token: String,
    expires_in: Option<u64>,
}

impl AuthToken {
    pub fn new(access_token: impl Into<String>, expires_in: Option<u64>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
        }
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of compute-scoped bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<AuthToken, HandlerError>;
}

/// Fixed token supplied through configuration, for local runs
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self) -> Result<AuthToken, HandlerError> {
        if self.token.trim().is_empty() {
            return Err(HandlerError::Credential {
                message: "ACCESS_TOKEN is set but empty".to_string(),
            });
        }
        Ok(AuthToken::new(self.token.clone(), None))
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Default service account tokens from the metadata server of the hosting
/// runtime
pub struct MetadataServerTokenProvider {
    client: reqwest::Client,
    token_url: String,
}

impl MetadataServerTokenProvider {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            token_url: format!(
                "{}{}",
                config.metadata_server_url.trim_end_matches('/'),
                TOKEN_PATH
            ),
        })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerTokenProvider {
    async fn fetch_token(&self) -> Result<AuthToken, HandlerError> {
        let response = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", COMPUTE_SCOPE)])
            .send()
            .await
            .map_err(|e| HandlerError::Credential {
                message: format!("Metadata server request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(HandlerError::Credential {
                message: format!("Metadata server returned error status {}: {}", status, body),
            });
        }

        let token: MetadataTokenResponse =
            response
                .json()
                .await
                .map_err(|e| HandlerError::Credential {
                    message: format!("Invalid metadata server token response: {}", e),
                })?;

        if token.access_token.is_empty() {
            return Err(HandlerError::Credential {
                message: "Metadata server returned an empty access token".to_string(),
            });
        }

        debug!(
            expires_in = ?token.expires_in,
            token_type = ?token.token_type,
            "Obtained access token from metadata server"
        );
        Ok(AuthToken::new(token.access_token, token.expires_in))
    }
}
