//! Periodic membership reconciliation
//!
//! The reconciler is the only stateful piece of discovery. It owns the
//! authoritative membership set and cycles Idle -> Polling -> Reconciling ->
//! Idle on a single task. The next poll is armed only after the previous
//! reconciliation finished, so polls never overlap. A failed poll leaves
//! membership untouched and is retried on the next interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::StrategyConfig;
use crate::directory::{Directory, DirectoryClient};
use crate::discovery::{get_candidate_members, SelfIdentity};
use crate::error::{ConfigError, DiscoveryError, DiscoveryResult};
use crate::membership::{reconcile, MembershipManager, ReconcileReport};
use crate::types::MembershipSet;

/// Reconciler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcilerState {
    /// Waiting for the next poll
    Idle,
    /// Querying the directory
    Polling,
    /// Applying connect/disconnect for a successful poll
    Reconciling,
    /// The loop has ended
    Stopped,
}

/// Snapshot published after every state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    pub state: ReconcilerState,
    pub members: MembershipSet,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub polls: u64,
}

impl Default for DiscoveryStatus {
    fn default() -> Self {
        Self {
            state: ReconcilerState::Idle,
            members: MembershipSet::new(),
            last_poll_at: None,
            last_error: None,
            consecutive_failures: 0,
            polls: 0,
        }
    }
}

/// Membership reconciler for one cluster-discovery instance
pub struct Reconciler<D, M> {
    config: StrategyConfig,
    client: DirectoryClient<D>,
    manager: M,
    hostname: Option<String>,
    known: MembershipSet,
    status: watch::Sender<DiscoveryStatus>,
}

impl<D, M> Reconciler<D, M>
where
    D: Directory + 'static,
    M: MembershipManager + 'static,
{
    /// Create a reconciler. Fails on structurally invalid configuration.
    pub fn new(config: StrategyConfig, directory: D, manager: M) -> Result<Self, ConfigError> {
        config.check_structure()?;
        let (status, _) = watch::channel(DiscoveryStatus::default());

        Ok(Self {
            config,
            client: DirectoryClient::new(directory),
            manager,
            hostname: None,
            known: MembershipSet::new(),
            status,
        })
    }

    /// Local hostname used for self-exclusion in `private_dns` mode
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn known_members(&self) -> &MembershipSet {
        &self.known
    }

    pub fn subscribe(&self) -> watch::Receiver<DiscoveryStatus> {
        self.status.subscribe()
    }

    fn identity(&self) -> SelfIdentity {
        SelfIdentity::for_mode(
            self.config.address_mode,
            self.manager.local_member(),
            self.hostname.clone(),
        )
    }

    fn set_state(&self, state: ReconcilerState) {
        self.status.send_modify(|status| status.state = state);
    }

    /// Run one poll and, if it succeeds, one reconciliation.
    ///
    /// On error the known membership is left as it was.
    pub async fn poll_once(&mut self) -> DiscoveryResult<ReconcileReport> {
        self.set_state(ReconcilerState::Polling);
        let identity = self.identity();

        let discovered = match get_candidate_members(&self.client, &self.config, &identity).await {
            Ok(discovered) => discovered,
            Err(e) => {
                self.status.send_modify(|status| {
                    status.state = ReconcilerState::Idle;
                    status.last_poll_at = Some(Utc::now());
                    status.last_error = Some(e.to_string());
                    status.consecutive_failures += 1;
                    status.polls += 1;
                });
                return Err(e);
            }
        };

        self.set_state(ReconcilerState::Reconciling);
        let report = reconcile(&self.manager, &self.known, discovered).await;
        self.known = report.members.clone();

        let members = self.known.clone();
        self.status.send_modify(|status| {
            status.state = ReconcilerState::Idle;
            status.members = members;
            status.last_poll_at = Some(Utc::now());
            status.last_error = None;
            status.consecutive_failures = 0;
            status.polls += 1;
        });

        Ok(report)
    }

    /// Start the periodic loop on the tokio runtime. The first poll runs
    /// immediately.
    pub fn spawn(self) -> DiscoveryHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let status = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));

        DiscoveryHandle {
            shutdown: shutdown_tx,
            task,
            status,
        }
    }

    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let interval = self.config.poll_interval();
        info!(
            cluster = %self.config.cluster,
            region = %self.config.region,
            interval_ms = self.config.poll_interval_ms,
            "Cluster discovery started"
        );

        loop {
            match self.poll_once().await {
                Ok(report) => debug!(report = %report, "Discovery poll completed"),
                Err(e) if e.is_fatal() => {
                    error!(cluster = %self.config.cluster, error = %e, "Cluster discovery aborted");
                    break;
                }
                Err(e) => log_poll_failure(&self.config, &e),
            }

            // Stop requests are only observed while idle; a running poll is
            // never interrupted.
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.set_state(ReconcilerState::Stopped);
        info!(cluster = %self.config.cluster, members = self.known.len(), "Cluster discovery stopped");
    }
}

fn log_poll_failure(config: &StrategyConfig, err: &DiscoveryError) {
    match err {
        DiscoveryError::Validation(e) => {
            warn!(field = e.field, error = %err, "Cluster discovery configuration is invalid, keeping current membership")
        }
        _ => warn!(
            cluster = %config.cluster,
            error = %err,
            "Cluster discovery poll failed, keeping current membership"
        ),
    }
}

/// Handle to a running reconciliation loop.
///
/// Dropping the handle stops the loop at its next idle point.
#[derive(Debug)]
pub struct DiscoveryHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
    status: watch::Receiver<DiscoveryStatus>,
}

impl DiscoveryHandle {
    pub fn status(&self) -> DiscoveryStatus {
        self.status.borrow().clone()
    }

    /// Current authoritative membership
    pub fn members(&self) -> MembershipSet {
        self.status.borrow().members.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DiscoveryStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "Cluster discovery task failed");
        }
    }
}
