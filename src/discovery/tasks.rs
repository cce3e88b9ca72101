//! Task collection across the configured services

use tracing::debug;

use super::resolver::resolve_service;
use crate::directory::{Directory, DirectoryClient};
use crate::error::DiscoveryResult;

/// Collect running task identifiers for every configured service name.
///
/// Services are resolved against `services` and visited in configuration
/// order. The first failure of any step short-circuits the collection.
/// Identifiers shared by several services are kept as-is.
pub async fn collect_tasks<D: Directory>(
    client: &DirectoryClient<D>,
    cluster: &str,
    region: &str,
    service_names: &[String],
    services: &[String],
) -> DiscoveryResult<Vec<String>> {
    let mut tasks = Vec::new();

    for name in service_names {
        let service = resolve_service(name, services)?;
        let service_tasks = client.list_tasks(cluster, service, region).await?;
        debug!(service = %service, tasks = service_tasks.len(), "Listed running tasks");
        tasks.extend(service_tasks);
    }

    Ok(tasks)
}
