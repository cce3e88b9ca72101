//! Member address extraction from described tasks
//!
//! Two attachment shapes are supported. In `ipv4` mode every container's
//! network interfaces are read for a private IPv4 address. In `private_dns`
//! mode the task's elastic network interface attachments are read for their
//! `privateDnsName` detail. Entries lacking the field are skipped.

use crate::directory::{Attachment, DescribeTasksResponse, TaskDetail};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::types::{AddressMode, MemberAddress};

/// Attachment type carrying network interface details
pub const NETWORK_INTERFACE_ATTACHMENT: &str = "ElasticNetworkInterface";

/// Attachment detail naming the interface's private DNS name
pub const PRIVATE_DNS_NAME_DETAIL: &str = "privateDnsName";

/// Extract member addresses from a describe-tasks batch
pub fn extract_addresses(
    described: &DescribeTasksResponse,
    mode: AddressMode,
) -> DiscoveryResult<Vec<MemberAddress>> {
    let tasks = described
        .tasks
        .as_ref()
        .ok_or_else(|| DiscoveryError::Extraction("describe tasks response without tasks".to_string()))?;

    let addresses = match mode {
        AddressMode::Ipv4 => tasks.iter().flat_map(ipv4_addresses).collect(),
        AddressMode::PrivateDns => tasks.iter().flat_map(private_dns_names).collect(),
    };
    Ok(addresses)
}

fn ipv4_addresses(task: &TaskDetail) -> Vec<MemberAddress> {
    task.containers
        .iter()
        .flatten()
        .flat_map(|container| container.network_interfaces.iter().flatten())
        .filter_map(|interface| interface.private_ipv4_address.as_deref())
        .filter(|address| !address.is_empty())
        .map(MemberAddress::new)
        .collect()
}

fn private_dns_names(task: &TaskDetail) -> Vec<MemberAddress> {
    task.attachments
        .iter()
        .flatten()
        .filter(|attachment| attachment.kind.as_deref() == Some(NETWORK_INTERFACE_ATTACHMENT))
        .filter_map(private_dns_name)
        .map(MemberAddress::new)
        .collect()
}

fn private_dns_name(attachment: &Attachment) -> Option<&str> {
    attachment
        .details
        .iter()
        .flatten()
        .find(|detail| detail.name.as_deref() == Some(PRIVATE_DNS_NAME_DETAIL))
        .and_then(|detail| detail.value.as_deref())
        .filter(|value| !value.is_empty())
}
