//! Self-exclusion
//!
//! A process must never try to connect to itself. Its own identity is passed
//! in explicitly; when it cannot be determined the filter does nothing.

use std::net::Ipv4Addr;
use tracing::debug;

use crate::types::{ipv4_from_hostname, AddressMode, MemberId, MembershipSet};

/// What the calling process knows about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfIdentity {
    /// Member identity registered by the host runtime
    Member(MemberId),
    /// Local hostname, which may encode the private address (`ip-10-0-0-5...`)
    Hostname(String),
    /// Nothing is known; no member is excluded
    Unknown,
}

impl SelfIdentity {
    /// Pick the identity matching the address shape produced in `mode`.
    ///
    /// `ipv4` members are compared against the registered identity, `private_dns`
    /// members against the address encoded in the local hostname.
    pub fn for_mode(mode: AddressMode, member: Option<MemberId>, hostname: Option<String>) -> Self {
        let identity = match mode {
            AddressMode::Ipv4 => member.map(SelfIdentity::Member),
            AddressMode::PrivateDns => hostname.map(SelfIdentity::Hostname),
        };
        identity.unwrap_or(SelfIdentity::Unknown)
    }

    fn hostname_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            SelfIdentity::Hostname(hostname) => ipv4_from_hostname(hostname),
            _ => None,
        }
    }
}

/// Remove the calling process from a discovered member set
pub fn exclude_self(mut members: MembershipSet, identity: &SelfIdentity) -> MembershipSet {
    match identity {
        SelfIdentity::Member(own) => {
            if members.remove(own) {
                debug!(member = %own, "Excluded own member identity");
            }
        }
        SelfIdentity::Hostname(hostname) => match identity.hostname_ipv4() {
            Some(own_ip) => {
                let before = members.len();
                members.retain(|member| member.address().private_ipv4() != Some(own_ip));
                if members.len() != before {
                    debug!(hostname = %hostname, ip = %own_ip, "Excluded own address");
                }
            }
            None => debug!(hostname = %hostname, "Hostname does not encode an address, nothing excluded"),
        },
        SelfIdentity::Unknown => {}
    }
    members
}
