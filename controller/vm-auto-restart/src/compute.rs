//! Compute API client and the resources it returns
//!
//! Only the three calls the handler needs are modelled: fetching the instance
//! descriptor, listing recent operations for the instance, and starting it.

use crate::auth::AuthToken;
use crate::config::Config;
use crate::error::HandlerError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Lifecycle status of an instance as reported by the compute API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceStatus {
    Provisioning,
    Staging,
    Running,
    Stopping,
    Stopped,
    Suspending,
    Suspended,
    Repairing,
    Terminated,
    Other(String),
}

impl InstanceStatus {
    /// Only instances that are fully down are considered for a restart.
    /// Transitional states are left alone.
    pub fn is_restartable(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Terminated | InstanceStatus::Stopped | InstanceStatus::Suspended
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Provisioning => "PROVISIONING",
            InstanceStatus::Staging => "STAGING",
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Stopping => "STOPPING",
            InstanceStatus::Stopped => "STOPPED",
            InstanceStatus::Suspending => "SUSPENDING",
            InstanceStatus::Suspended => "SUSPENDED",
            InstanceStatus::Repairing => "REPAIRING",
            InstanceStatus::Terminated => "TERMINATED",
            InstanceStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for InstanceStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PROVISIONING" => InstanceStatus::Provisioning,
            "STAGING" => InstanceStatus::Staging,
            "RUNNING" => InstanceStatus::Running,
            "STOPPING" => InstanceStatus::Stopping,
            "STOPPED" => InstanceStatus::Stopped,
            "SUSPENDING" => InstanceStatus::Suspending,
            "SUSPENDED" => InstanceStatus::Suspended,
            "REPAIRING" => InstanceStatus::Repairing,
            "TERMINATED" => InstanceStatus::Terminated,
            _ => InstanceStatus::Other(raw),
        }
    }
}

impl From<InstanceStatus> for String {
    fn from(status: InstanceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataItem {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub items: Vec<MetadataItem>,
}

/// Instance resource, trimmed to the fields the decision reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub status: InstanceStatus,
    #[serde(default)]
    pub metadata: Metadata,
}

/// One entry of the zone operations list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationRecord {
    #[serde(rename = "operationType", default)]
    pub operation_type: String,
    #[serde(rename = "targetLink", default)]
    pub target_link: Option<String>,
    #[serde(rename = "insertTime", default)]
    pub insert_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationList {
    #[serde(default)]
    pub items: Vec<OperationRecord>,
}

/// Compute API surface used by the handler. Every call is scoped to the
/// single configured instance.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Fetch the instance descriptor
    async fn get_instance(&self, token: &AuthToken) -> Result<InstanceDescriptor, HandlerError>;

    /// List operations whose targetLink is the instance, most recent first
    async fn list_operations(
        &self,
        token: &AuthToken,
        max_results: u32,
    ) -> Result<Vec<OperationRecord>, HandlerError>;

    /// Issue the start command
    async fn start_instance(&self, token: &AuthToken) -> Result<(), HandlerError>;
}

/// HTTP compute API client
pub struct HttpComputeClient {
    client: reqwest::Client,
    instance_url: String,
    start_url: String,
    operations_url: String,
    operations_filter: String,
}

impl HttpComputeClient {
    /// Create a new compute client for the configured instance
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            instance_url: config.instance_url(),
            start_url: config.start_url(),
            operations_url: config.operations_url(),
            operations_filter: config.operations_filter(),
        })
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        token: &AuthToken,
    ) -> Result<reqwest::Response, HandlerError> {
        let response = request
            .header(AUTHORIZATION, token.bearer())
            .send()
            .await
            .map_err(|e| HandlerError::Transport {
                operation,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(HandlerError::RemoteCall {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        debug!(operation = operation, status = %status, "Compute API call succeeded");
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, HandlerError> {
        response
            .json::<T>()
            .await
            .map_err(|e| HandlerError::InvalidResponse {
                operation,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl ComputeApi for HttpComputeClient {
    async fn get_instance(&self, token: &AuthToken) -> Result<InstanceDescriptor, HandlerError> {
        const OPERATION: &str = "instances.get";

        let response = self
            .send(OPERATION, self.client.get(&self.instance_url), token)
            .await?;
        Self::decode(OPERATION, response).await
    }

    async fn list_operations(
        &self,
        token: &AuthToken,
        max_results: u32,
    ) -> Result<Vec<OperationRecord>, HandlerError> {
        const OPERATION: &str = "zoneOperations.list";

        let request = self.client.get(&self.operations_url).query(&[
            ("filter", self.operations_filter.clone()),
            ("maxResults", max_results.to_string()),
        ]);
        let response = self.send(OPERATION, request, token).await?;
        let list: OperationList = Self::decode(OPERATION, response).await?;
        Ok(list.items)
    }

    async fn start_instance(&self, token: &AuthToken) -> Result<(), HandlerError> {
        const OPERATION: &str = "instances.start";

        self.send(OPERATION, self.client.post(&self.start_url), token)
            .await?;
        Ok(())
    }
}
