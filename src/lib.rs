//! # REAM Cluster: container-orchestrator membership discovery
//!
//! Discovers the live members of a REAM process cluster by querying the
//! container orchestrator's control plane for the running tasks of one or
//! more services, and reconciles the result against the locally known
//! membership through a pluggable [`MembershipManager`].
//!
//! Discovery is read-only. The host runtime owns the actual connections and
//! reports which connect/disconnect requests it could not honour; the
//! [`Reconciler`] folds those reports back so its membership set always
//! reflects what was achieved.

#![warn(clippy::all)]

pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod membership;
pub mod reconciler;
pub mod types;

// Re-export main types
pub use config::{load_from_file, validate, ClusterConfigFile, StrategyConfig};
pub use directory::{Directory, DirectoryClient, HttpDirectory, HttpDirectoryConfig};
pub use discovery::{get_candidate_members, SelfIdentity};
pub use error::{ConfigError, DirectoryError, DiscoveryError, DiscoveryResult, ValidationError};
pub use membership::{FailedMember, MembershipDelta, MembershipManager, MembershipOutcome, ReconcileReport};
pub use reconciler::{DiscoveryHandle, DiscoveryStatus, Reconciler, ReconcilerState};
pub use types::{AddressMode, MemberAddress, MemberId, MembershipSet, ServiceNames};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Start discovery against the control plane's HTTP API.
///
/// `hostname` is used for self-exclusion in `private_dns` mode. Must be called
/// from within a tokio runtime.
pub fn start_http_discovery<M>(
    file: ClusterConfigFile,
    manager: M,
    hostname: Option<String>,
) -> anyhow::Result<DiscoveryHandle>
where
    M: MembershipManager + 'static,
{
    let directory = HttpDirectory::new(file.directory)?;
    let mut reconciler = Reconciler::new(file.strategy, directory, manager)?;
    if let Some(hostname) = hostname {
        reconciler = reconciler.with_hostname(hostname);
    }
    Ok(reconciler.spawn())
}
