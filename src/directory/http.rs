//! HTTP implementation of the directory service
//!
//! Speaks the JSON protocol of the container service control plane: every
//! operation is a POST to the regional endpoint with the operation named in the
//! `X-Amz-Target` header. Requests are not signed; point `endpoint` at a
//! signing proxy or a local emulator.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{
    DescribeTasksResponse, Directory, ListServicesPage, ListTasksResponse, DESIRED_STATUS_RUNNING,
};
use crate::error::DirectoryError;

const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";

/// HTTP directory configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpDirectoryConfig {
    /// Endpoint URL template, `{region}` is substituted per request
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Upper bound on a single request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://ecs.{region}.amazonaws.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for HttpDirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl HttpDirectoryConfig {
    pub fn endpoint_for(&self, region: &str) -> String {
        self.endpoint.replace("{region}", region)
    }
}

/// Directory backed by the control plane's HTTP API
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    config: HttpDirectoryConfig,
}

impl HttpDirectory {
    pub fn new(config: HttpDirectoryConfig) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpDirectoryConfig {
        &self.config
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        region: &str,
        body: serde_json::Value,
    ) -> Result<T, DirectoryError> {
        let url = self.config.endpoint_for(region);
        debug!(operation, url = %url, "Directory request");

        let payload = serde_json::to_vec(&body).map_err(|e| DirectoryError::Transport(e.to_string()))?;
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .body(payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| DirectoryError::UnrecognizedShape(format!("{}: {}", operation, e)))
    }
}

fn map_transport_error(err: reqwest::Error) -> DirectoryError {
    if err.is_timeout() {
        DirectoryError::Timeout
    } else {
        DirectoryError::Transport(err.to_string())
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
        region: &str,
    ) -> Result<ListServicesPage, DirectoryError> {
        let mut body = json!({ "cluster": cluster });
        if let Some(token) = next_token {
            body["nextToken"] = json!(token);
        }
        self.call("ListServices", region, body).await
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        region: &str,
    ) -> Result<ListTasksResponse, DirectoryError> {
        let body = json!({
            "cluster": cluster,
            "serviceName": service,
            "desiredStatus": DESIRED_STATUS_RUNNING,
        });
        self.call("ListTasks", region, body).await
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
        region: &str,
    ) -> Result<DescribeTasksResponse, DirectoryError> {
        let body = json!({ "cluster": cluster, "tasks": tasks });
        self.call("DescribeTasks", region, body).await
    }
}
