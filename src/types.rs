//! Core types shared by discovery and reconciliation

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;
use serde::{Deserialize, Serialize};

/// Network address of a discovered member: an IPv4 literal or a private hostname
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberAddress(pub String);

impl MemberAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The private IPv4 address this member is reachable at, if recoverable.
    ///
    /// Literal addresses parse directly. Hostnames of the form
    /// `ip-10-0-0-5.ec2.internal` encode the address in their first label.
    pub fn private_ipv4(&self) -> Option<Ipv4Addr> {
        if let Ok(ip) = self.0.parse::<Ipv4Addr>() {
            return Some(ip);
        }
        ipv4_from_hostname(&self.0)
    }
}

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode an `ip-a-b-c-d[.suffix]` hostname into `a.b.c.d`
pub fn ipv4_from_hostname(hostname: &str) -> Option<Ipv4Addr> {
    let label = hostname.split('.').next()?;
    let encoded = label.strip_prefix("ip-")?;
    encoded.replace('-', ".").parse().ok()
}

/// Canonical process-cluster member name, `prefix@address`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MemberId {
    prefix: String,
    address: MemberAddress,
}

impl MemberId {
    pub fn new(prefix: impl Into<String>, address: MemberAddress) -> Self {
        Self {
            prefix: prefix.into(),
            address,
        }
    }

    /// Parse a `prefix@address` string. Addresses never contain `@`, so the
    /// last separator splits.
    pub fn parse(s: &str) -> Option<Self> {
        let (prefix, address) = s.rsplit_once('@')?;
        if address.is_empty() {
            return None;
        }
        Some(Self::new(prefix, MemberAddress::new(address)))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn address(&self) -> &MemberAddress {
        &self.address
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.prefix, self.address)
    }
}

impl From<MemberId> for String {
    fn from(id: MemberId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MemberId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        MemberId::parse(&s).ok_or_else(|| format!("not a member identifier: {}", s))
    }
}

/// Authoritative, duplicate-free membership
pub type MembershipSet = BTreeSet<MemberId>;

/// Configured service identifiers, given as a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceNames {
    One(String),
    Many(Vec<String>),
}

impl ServiceNames {
    /// Coerce to a list
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            ServiceNames::One(name) => vec![name.clone()],
            ServiceNames::Many(names) => names.clone(),
        }
    }
}

impl From<&str> for ServiceNames {
    fn from(name: &str) -> Self {
        ServiceNames::One(name.to_string())
    }
}

impl From<Vec<&str>> for ServiceNames {
    fn from(names: Vec<&str>) -> Self {
        ServiceNames::Many(names.into_iter().map(str::to_string).collect())
    }
}

/// How member addresses are read from described tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    /// Private IPv4 of each container network interface
    #[default]
    Ipv4,
    /// Private DNS name of each elastic network interface attachment
    PrivateDns,
}
