//! Cluster directory service
//!
//! The directory is the external control plane that enumerates services and
//! their running tasks. It is consumed through the [`Directory`] trait, whose
//! responses mirror the wire shapes with every optional field kept optional.
//! [`DirectoryClient`] layers pagination and shape checks on top.

pub mod http;

pub use http::{HttpDirectory, HttpDirectoryConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DirectoryError;

/// Desired status filter applied when listing tasks
pub const DESIRED_STATUS_RUNNING: &str = "RUNNING";

/// One page of service identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListServicesPage {
    pub service_arns: Option<Vec<String>>,
    pub next_token: Option<String>,
}

/// Running task identifiers of one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksResponse {
    pub task_arns: Option<Vec<String>>,
    pub next_token: Option<String>,
}

/// Described tasks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeTasksResponse {
    pub tasks: Option<Vec<TaskDetail>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    pub task_arn: Option<String>,
    pub containers: Option<Vec<Container>>,
    pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub network_interfaces: Option<Vec<NetworkInterface>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub private_ipv4_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub details: Option<Vec<KeyValuePair>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub name: Option<String>,
    pub value: Option<String>,
}

/// Read operations of the directory service. All take a region selector
/// used for endpoint routing.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
        region: &str,
    ) -> Result<ListServicesPage, DirectoryError>;

    /// List tasks of `service` whose desired status is running
    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        region: &str,
    ) -> Result<ListTasksResponse, DirectoryError>;

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
        region: &str,
    ) -> Result<DescribeTasksResponse, DirectoryError>;
}

#[async_trait]
impl<D: Directory + ?Sized> Directory for std::sync::Arc<D> {
    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
        region: &str,
    ) -> Result<ListServicesPage, DirectoryError> {
        (**self).list_services(cluster, next_token, region).await
    }

    async fn list_tasks(
        &self,
        cluster: &str,
        service: &str,
        region: &str,
    ) -> Result<ListTasksResponse, DirectoryError> {
        (**self).list_tasks(cluster, service, region).await
    }

    async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
        region: &str,
    ) -> Result<DescribeTasksResponse, DirectoryError> {
        (**self).describe_tasks(cluster, tasks, region).await
    }
}

/// Uniform access to the directory used by a discovery poll
#[derive(Debug, Clone)]
pub struct DirectoryClient<D> {
    inner: D,
}

impl<D: Directory> DirectoryClient<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// All service identifiers of the cluster, following continuation tokens
    /// until the directory stops returning one. A failure on any page aborts
    /// the whole listing.
    pub async fn list_services(&self, cluster: &str, region: &str) -> Result<Vec<String>, DirectoryError> {
        let mut services = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .inner
                .list_services(cluster, next_token.as_deref(), region)
                .await?;
            pages += 1;

            let arns = page.service_arns.ok_or_else(|| {
                DirectoryError::UnrecognizedShape("list services response without serviceArns".to_string())
            })?;
            services.extend(arns);

            match page.next_token {
                Some(token) if !token.is_empty() => {
                    if next_token.as_deref() == Some(token.as_str()) {
                        return Err(DirectoryError::UnrecognizedShape(format!(
                            "list services returned the continuation token it was given: {}",
                            token
                        )));
                    }
                    next_token = Some(token);
                }
                _ => break,
            }
        }

        debug!(cluster = %cluster, pages, services = services.len(), "Listed services");
        Ok(services)
    }

    /// Running task identifiers of one service. Single page.
    pub async fn list_tasks(&self, cluster: &str, service: &str, region: &str) -> Result<Vec<String>, DirectoryError> {
        let response = self.inner.list_tasks(cluster, service, region).await?;
        response.task_arns.ok_or_else(|| {
            DirectoryError::UnrecognizedShape("list tasks response without taskArns".to_string())
        })
    }

    /// Describe a batch of tasks. An empty batch is answered locally.
    pub async fn describe_tasks(
        &self,
        cluster: &str,
        tasks: &[String],
        region: &str,
    ) -> Result<DescribeTasksResponse, DirectoryError> {
        if tasks.is_empty() {
            return Ok(DescribeTasksResponse { tasks: Some(Vec::new()) });
        }
        self.inner.describe_tasks(cluster, tasks, region).await
    }
}
