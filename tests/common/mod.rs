//! In-memory directory and membership doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use ream_cluster::directory::{
    Container, DescribeTasksResponse, Directory, ListServicesPage, ListTasksResponse,
    NetworkInterface, TaskDetail,
};
use ream_cluster::{DirectoryError, FailedMember, MemberId, MembershipManager, MembershipOutcome, MembershipSet};

/// Directory state a test can rewrite between polls
#[derive(Default)]
struct DirectoryState {
    service_pages: Vec<ListServicesPage>,
    tasks: HashMap<String, Vec<String>>,
    details: HashMap<String, TaskDetail>,
    failures: VecDeque<DirectoryError>,
}

#[derive(Default)]
pub struct MockDirectory {
    state: Mutex<DirectoryState>,
    pub listed_services: Mutex<Vec<Option<String>>>,
    pub listed_tasks: Mutex<Vec<String>>,
    pub described: Mutex<Vec<Vec<String>>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// One page per entry, chained with continuation tokens
    pub fn with_service_pages(self, pages: &[&[&str]]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.service_pages = pages
                .iter()
                .enumerate()
                .map(|(i, arns)| ListServicesPage {
                    service_arns: Some(arns.iter().map(|s| s.to_string()).collect()),
                    next_token: (i + 1 < pages.len()).then(|| format!("page-{}", i + 1)),
                })
                .collect();
        }
        self
    }

    pub fn with_services(self, services: &[&str]) -> Self {
        self.with_service_pages(&[services])
    }

    /// Register running tasks of `service`, each exposing one private IPv4
    pub fn with_ipv4_tasks(self, service: &str, tasks: &[(&str, &str)]) -> Self {
        self.set_ipv4_tasks(service, tasks);
        self
    }

    pub fn set_ipv4_tasks(&self, service: &str, tasks: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state
            .tasks
            .insert(service.to_string(), tasks.iter().map(|(arn, _)| arn.to_string()).collect());
        for (arn, ip) in tasks {
            state.details.insert(arn.to_string(), ipv4_task(arn, Some(ip)));
        }
    }

    pub fn with_task_detail(self, service: &str, detail: TaskDetail) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let arn = detail.task_arn.clone().unwrap_or_default();
            state.tasks.entry(service.to_string()).or_default().push(arn.clone());
            state.details.insert(arn, detail);
        }
        self
    }

    /// Fail the next directory call with `error`
    pub fn fail_next(&self, error: DirectoryError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    fn take_failure(&self) -> Result<(), DirectoryError> {
        match self.state.lock().unwrap().failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn ipv4_task(arn: &str, ip: Option<&str>) -> TaskDetail {
    TaskDetail {
        task_arn: Some(arn.to_string()),
        containers: Some(vec![Container {
            network_interfaces: Some(vec![NetworkInterface {
                private_ipv4_address: ip.map(str::to_string),
            }]),
        }]),
        attachments: None,
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn list_services(
        &self,
        _cluster: &str,
        next_token: Option<&str>,
        _region: &str,
    ) -> Result<ListServicesPage, DirectoryError> {
        self.take_failure()?;
        self.listed_services.lock().unwrap().push(next_token.map(str::to_string));

        let state = self.state.lock().unwrap();
        let index = match next_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|i| i.parse::<usize>().ok())
                .ok_or_else(|| DirectoryError::UnrecognizedShape(format!("unknown token {}", token)))?,
        };
        Ok(state.service_pages.get(index).cloned().unwrap_or(ListServicesPage {
            service_arns: Some(Vec::new()),
            next_token: None,
        }))
    }

    async fn list_tasks(
        &self,
        _cluster: &str,
        service: &str,
        _region: &str,
    ) -> Result<ListTasksResponse, DirectoryError> {
        self.take_failure()?;
        self.listed_tasks.lock().unwrap().push(service.to_string());

        let state = self.state.lock().unwrap();
        Ok(ListTasksResponse {
            task_arns: Some(state.tasks.get(service).cloned().unwrap_or_default()),
            next_token: None,
        })
    }

    async fn describe_tasks(
        &self,
        _cluster: &str,
        tasks: &[String],
        _region: &str,
    ) -> Result<DescribeTasksResponse, DirectoryError> {
        self.take_failure()?;
        self.described.lock().unwrap().push(tasks.to_vec());

        let state = self.state.lock().unwrap();
        Ok(DescribeTasksResponse {
            tasks: Some(tasks.iter().filter_map(|arn| state.details.get(arn).cloned()).collect()),
        })
    }
}

/// Tracks which members are actually connected and fails scripted ones
#[derive(Default)]
pub struct RecordingMembership {
    pub local: Option<MemberId>,
    pub connected: Mutex<HashSet<MemberId>>,
    pub connect_calls: Mutex<Vec<Vec<MemberId>>>,
    pub disconnect_calls: Mutex<Vec<Vec<MemberId>>>,
    connect_failures: Mutex<HashMap<MemberId, String>>,
    disconnect_failures: Mutex<HashMap<MemberId, String>>,
}

impl RecordingMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, local: &str) -> Self {
        self.local = Some(member(local));
        self
    }

    pub fn fail_connect(&self, id: &str, reason: &str) {
        self.connect_failures.lock().unwrap().insert(member(id), reason.to_string());
    }

    pub fn fail_disconnect(&self, id: &str, reason: &str) {
        self.disconnect_failures.lock().unwrap().insert(member(id), reason.to_string());
    }

    pub fn clear_failures(&self) {
        self.connect_failures.lock().unwrap().clear();
        self.disconnect_failures.lock().unwrap().clear();
    }

    pub fn connected_set(&self) -> MembershipSet {
        self.connected.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl MembershipManager for RecordingMembership {
    async fn connect(&self, members: &[MemberId]) -> MembershipOutcome {
        self.connect_calls.lock().unwrap().push(members.to_vec());
        let failures = self.connect_failures.lock().unwrap();
        let mut connected = self.connected.lock().unwrap();

        let mut failed = Vec::new();
        for m in members {
            match failures.get(m) {
                Some(reason) => failed.push(FailedMember::new(m.clone(), reason.clone())),
                None => {
                    connected.insert(m.clone());
                }
            }
        }
        outcome(failed)
    }

    async fn disconnect(&self, members: &[MemberId]) -> MembershipOutcome {
        self.disconnect_calls.lock().unwrap().push(members.to_vec());
        let failures = self.disconnect_failures.lock().unwrap();
        let mut connected = self.connected.lock().unwrap();

        let mut failed = Vec::new();
        for m in members {
            match failures.get(m) {
                Some(reason) => failed.push(FailedMember::new(m.clone(), reason.clone())),
                None => {
                    connected.remove(m);
                }
            }
        }
        outcome(failed)
    }

    fn local_member(&self) -> Option<MemberId> {
        self.local.clone()
    }
}

fn outcome(failed: Vec<FailedMember>) -> MembershipOutcome {
    if failed.is_empty() {
        MembershipOutcome::Ok
    } else {
        MembershipOutcome::PartialFailure(failed)
    }
}

pub fn member(id: &str) -> MemberId {
    MemberId::parse(id).unwrap()
}

pub fn members(ids: &[&str]) -> MembershipSet {
    ids.iter().map(|id| member(id)).collect()
}
