//! Membership manager seam and reconciliation
//!
//! The host runtime owns the actual connections between members. This module
//! only computes what should change and folds the reported outcome back into
//! the membership set, so the set always reflects what was achieved rather
//! than what was attempted.

use std::fmt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{MemberId, MembershipSet};

/// Result of a connect or disconnect batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipOutcome {
    /// Every member was handled
    Ok,
    /// The listed members could not be handled
    PartialFailure(Vec<FailedMember>),
}

/// A member the host failed to connect or disconnect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMember {
    pub member: MemberId,
    pub reason: String,
}

impl FailedMember {
    pub fn new(member: MemberId, reason: impl Into<String>) -> Self {
        Self {
            member,
            reason: reason.into(),
        }
    }
}

impl MembershipOutcome {
    pub fn failed(&self) -> &[FailedMember] {
        match self {
            MembershipOutcome::Ok => &[],
            MembershipOutcome::PartialFailure(failed) => failed,
        }
    }
}

/// Host-side membership operations
#[async_trait]
pub trait MembershipManager: Send + Sync {
    async fn connect(&self, members: &[MemberId]) -> MembershipOutcome;

    async fn disconnect(&self, members: &[MemberId]) -> MembershipOutcome;

    /// The identity this process is registered under, if the host knows it
    fn local_member(&self) -> Option<MemberId> {
        None
    }
}

#[async_trait]
impl<M: MembershipManager + ?Sized> MembershipManager for std::sync::Arc<M> {
    async fn connect(&self, members: &[MemberId]) -> MembershipOutcome {
        (**self).connect(members).await
    }

    async fn disconnect(&self, members: &[MemberId]) -> MembershipOutcome {
        (**self).disconnect(members).await
    }

    fn local_member(&self) -> Option<MemberId> {
        (**self).local_member()
    }
}

/// Members to add and remove between two polls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipDelta {
    pub added: MembershipSet,
    pub removed: MembershipSet,
}

impl MembershipDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Set difference in both directions
pub fn diff(known: &MembershipSet, discovered: &MembershipSet) -> MembershipDelta {
    MembershipDelta {
        added: discovered.difference(known).cloned().collect(),
        removed: known.difference(discovered).cloned().collect(),
    }
}

/// What one reconciliation achieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// The new authoritative membership set
    pub members: MembershipSet,
    /// The intended change
    pub delta: MembershipDelta,
    /// Members still connected because disconnecting them failed
    pub failed_disconnects: Vec<FailedMember>,
    /// Members not connected because connecting them failed
    pub failed_connects: Vec<FailedMember>,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} members (+{} -{}, {} connect failures, {} disconnect failures)",
            self.members.len(),
            self.delta.added.len(),
            self.delta.removed.len(),
            self.failed_connects.len(),
            self.failed_disconnects.len()
        )
    }
}

/// Drive connect/disconnect for the change from `known` to `discovered`.
///
/// Removed members are disconnected first; those the host reports as still
/// connected are put back into the working set. Added members are then
/// connected; those that failed are taken out of it. Members already known
/// are never re-connected.
pub async fn reconcile<M: MembershipManager + ?Sized>(
    manager: &M,
    known: &MembershipSet,
    discovered: MembershipSet,
) -> ReconcileReport {
    let delta = diff(known, &discovered);
    let mut members = discovered;

    let mut failed_disconnects = Vec::new();
    if !delta.removed.is_empty() {
        let removed: Vec<MemberId> = delta.removed.iter().cloned().collect();
        let outcome = manager.disconnect(&removed).await;
        for failure in outcome.failed() {
            warn!(member = %failure.member, reason = %failure.reason, "Failed to disconnect member");
            // Only members we asked to remove can be restored.
            if delta.removed.contains(&failure.member) {
                members.insert(failure.member.clone());
            }
        }
        failed_disconnects = outcome.failed().to_vec();
    }

    let mut failed_connects = Vec::new();
    if !delta.added.is_empty() {
        let added: Vec<MemberId> = delta.added.iter().cloned().collect();
        let outcome = manager.connect(&added).await;
        for failure in outcome.failed() {
            warn!(member = %failure.member, reason = %failure.reason, "Failed to connect member");
            if delta.added.contains(&failure.member) {
                members.remove(&failure.member);
            }
        }
        failed_connects = outcome.failed().to_vec();
    }

    if !delta.is_empty() {
        info!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            members = members.len(),
            "Membership changed"
        );
    }

    ReconcileReport {
        members,
        delta,
        failed_disconnects,
        failed_connects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn set(ids: &[&str]) -> MembershipSet {
        ids.iter().map(|id| MemberId::parse(id).unwrap()).collect()
    }

    fn id(s: &str) -> MemberId {
        MemberId::parse(s).unwrap()
    }

    /// Fails the configured members with a reason and records every call
    #[derive(Default)]
    struct ScriptedManager {
        connect_failures: HashMap<MemberId, String>,
        disconnect_failures: HashMap<MemberId, String>,
        connected: Mutex<Vec<Vec<MemberId>>>,
        disconnected: Mutex<Vec<Vec<MemberId>>>,
    }

    fn outcome_for(members: &[MemberId], failures: &HashMap<MemberId, String>) -> MembershipOutcome {
        let failed: Vec<FailedMember> = members
            .iter()
            .filter_map(|m| failures.get(m).map(|r| FailedMember::new(m.clone(), r.clone())))
            .collect();
        if failed.is_empty() {
            MembershipOutcome::Ok
        } else {
            MembershipOutcome::PartialFailure(failed)
        }
    }

    #[async_trait]
    impl MembershipManager for ScriptedManager {
        async fn connect(&self, members: &[MemberId]) -> MembershipOutcome {
            self.connected.lock().unwrap().push(members.to_vec());
            outcome_for(members, &self.connect_failures)
        }

        async fn disconnect(&self, members: &[MemberId]) -> MembershipOutcome {
            self.disconnected.lock().unwrap().push(members.to_vec());
            outcome_for(members, &self.disconnect_failures)
        }
    }

    #[test]
    fn test_diff() {
        let delta = diff(&set(&["app@a", "app@b"]), &set(&["app@b", "app@c"]));
        assert_eq!(delta.removed, set(&["app@a"]));
        assert_eq!(delta.added, set(&["app@c"]));
        assert!(diff(&set(&["app@a"]), &set(&["app@a"])).is_empty());
    }

    #[tokio::test]
    async fn test_full_success() {
        let manager = ScriptedManager::default();
        let report = reconcile(&manager, &set(&["app@a", "app@b"]), set(&["app@b", "app@c"])).await;

        assert_eq!(report.members, set(&["app@b", "app@c"]));
        assert_eq!(*manager.disconnected.lock().unwrap(), vec![vec![id("app@a")]]);
        assert_eq!(*manager.connected.lock().unwrap(), vec![vec![id("app@c")]]);
    }

    #[tokio::test]
    async fn test_failed_disconnect_is_retained() {
        let mut manager = ScriptedManager::default();
        manager.disconnect_failures.insert(id("app@n1"), "timeout".to_string());

        let report = reconcile(&manager, &set(&["app@n1", "app@n2"]), MembershipSet::new()).await;

        assert_eq!(report.members, set(&["app@n1"]));
        assert_eq!(report.failed_disconnects, vec![FailedMember::new(id("app@n1"), "timeout")]);
    }

    #[tokio::test]
    async fn test_failed_connect_is_dropped() {
        let mut manager = ScriptedManager::default();
        manager.connect_failures.insert(id("app@c"), "refused".to_string());

        let report = reconcile(&manager, &set(&["app@a"]), set(&["app@a", "app@b", "app@c"])).await;

        assert_eq!(report.members, set(&["app@a", "app@b"]));
        assert_eq!(report.failed_connects.len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_set_issues_no_calls() {
        let manager = ScriptedManager::default();
        let known = set(&["app@a", "app@b"]);

        let report = reconcile(&manager, &known, known.clone()).await;

        assert_eq!(report.members, known);
        assert!(report.delta.is_empty());
        assert!(manager.connected.lock().unwrap().is_empty());
        assert!(manager.disconnected.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_outside_the_delta_are_ignored() {
        struct Misreporting;

        #[async_trait]
        impl MembershipManager for Misreporting {
            async fn connect(&self, _members: &[MemberId]) -> MembershipOutcome {
                MembershipOutcome::PartialFailure(vec![FailedMember::new(id("app@a"), "stale")])
            }

            async fn disconnect(&self, _members: &[MemberId]) -> MembershipOutcome {
                MembershipOutcome::Ok
            }
        }

        let report = reconcile(&Misreporting, &set(&["app@a"]), set(&["app@a", "app@b"])).await;
        assert_eq!(report.members, set(&["app@a", "app@b"]));
    }
}
