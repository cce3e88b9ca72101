//! Candidate member discovery
//!
//! One poll validates the configuration, resolves the configured services,
//! collects their running tasks, describes them, extracts one address per
//! task and turns the addresses into member identifiers, minus the caller
//! itself. Directory calls are issued sequentially. Nothing here touches
//! membership state.

pub mod extract;
pub mod resolver;
pub mod self_filter;
pub mod tasks;

pub use extract::extract_addresses;
pub use resolver::resolve_service;
pub use self_filter::{exclude_self, SelfIdentity};
pub use tasks::collect_tasks;

use tracing::debug;

use crate::config::{validate, StrategyConfig};
use crate::directory::{Directory, DirectoryClient};
use crate::error::DiscoveryResult;
use crate::types::{MemberId, MembershipSet};

/// Compute the set of members the directory currently reports for `config`.
///
/// Read-only with respect to the directory and free of membership side
/// effects. An absent `service_names` yields a fatal error (see
/// [`DiscoveryError::is_fatal`](crate::error::DiscoveryError::is_fatal)).
pub async fn get_candidate_members<D: Directory>(
    client: &DirectoryClient<D>,
    config: &StrategyConfig,
    identity: &SelfIdentity,
) -> DiscoveryResult<MembershipSet> {
    let validated = validate(config)?;

    let services = client.list_services(validated.cluster, validated.region).await?;
    let task_ids = collect_tasks(
        client,
        validated.cluster,
        validated.region,
        &validated.service_names,
        &services,
    )
    .await?;

    let described = client
        .describe_tasks(validated.cluster, &task_ids, validated.region)
        .await?;
    let addresses = extract_addresses(&described, config.address_mode)?;

    let members: MembershipSet = addresses
        .into_iter()
        .map(|address| MemberId::new(config.name_prefix.clone(), address))
        .collect();

    let members = exclude_self(members, identity);
    debug!(
        cluster = %validated.cluster,
        tasks = task_ids.len(),
        members = members.len(),
        "Discovered candidate members"
    );
    Ok(members)
}
