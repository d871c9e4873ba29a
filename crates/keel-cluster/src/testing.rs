// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! In-process fakes for the node management API.
//!
//! - [`FakeConnector`]: resolves hosts to registered [`FakeMachine`]s and
//!   counts connection attempts
//! - [`FakeMachine`]: scripted responses plus a record of every command
//!   it received
//! - [`ScriptedConfirmer`]: answers confirmation prompts per host
//!
//! Unregistered hosts are unreachable. A fake machine behaves like a
//! healthy, not yet bootstrapped control-plane node until told otherwise.
//!
//! # Example
//!
//! ```ignore
//! use keel_cluster::testing::{FakeConnector, FakeMachine};
//!
//! let connector = FakeConnector::new();
//! let machine = FakeMachine::new();
//! machine.fail_member_lists(2, ApiError::Transport("starting".into()));
//! connector.add("10.0.0.1", machine.clone());
//!
//! // ... run the bootstrap protocol ...
//! assert_eq!(machine.bootstrap_calls(), 1);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use keel_core::NodeStatus;
use parking_lot::Mutex;

use crate::client::{
    EtcdMember, EtcdMemberListResponse, EtcdMembers, MachineClient, NodeConnector, ResetRequest,
};
use crate::error::{ApiError, ConnectionError};
use crate::reset::Confirmer;

#[derive(Debug)]
struct MachineState {
    status: Result<NodeStatus, ApiError>,
    bootstrapped: bool,
    member_list_failures: VecDeque<ApiError>,
    bootstrap_failures: VecDeque<ApiError>,
    reset_error: Option<ApiError>,
    member_list_calls: u32,
    bootstrap_calls: u32,
    reset_requests: Vec<ResetRequest>,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            status: Ok(NodeStatus::default()),
            bootstrapped: false,
            member_list_failures: VecDeque::new(),
            bootstrap_failures: VecDeque::new(),
            reset_error: None,
            member_list_calls: 0,
            bootstrap_calls: 0,
            reset_requests: Vec::new(),
        }
    }
}

/// A scripted node. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeMachine {
    state: Arc<Mutex<MachineState>>,
}

impl FakeMachine {
    /// Creates a healthy, not yet bootstrapped machine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status returned by `machine_status`.
    #[must_use]
    pub fn with_status(self, status: NodeStatus) -> Self {
        self.state.lock().status = Ok(status);
        self
    }

    /// Marks the consensus store as already initialized.
    #[must_use]
    pub fn bootstrapped(self) -> Self {
        self.state.lock().bootstrapped = true;
        self
    }

    /// Makes every following `machine_status` call fail.
    pub fn fail_status(&self, error: ApiError) {
        self.state.lock().status = Err(error);
    }

    /// Makes the next `count` membership queries fail.
    pub fn fail_member_lists(&self, count: usize, error: ApiError) {
        let mut state = self.state.lock();
        state.member_list_failures.extend(std::iter::repeat(error).take(count));
    }

    /// Makes the next `count` bootstrap commands fail.
    pub fn fail_bootstraps(&self, count: usize, error: ApiError) {
        let mut state = self.state.lock();
        state.bootstrap_failures.extend(std::iter::repeat(error).take(count));
    }

    /// Makes every reset command fail.
    pub fn fail_resets(&self, error: ApiError) {
        self.state.lock().reset_error = Some(error);
    }

    /// Number of membership queries received.
    #[must_use]
    pub fn member_list_calls(&self) -> u32 {
        self.state.lock().member_list_calls
    }

    /// Number of bootstrap commands received, failed ones included.
    #[must_use]
    pub fn bootstrap_calls(&self) -> u32 {
        self.state.lock().bootstrap_calls
    }

    /// Reset commands received, failed ones included.
    #[must_use]
    pub fn reset_requests(&self) -> Vec<ResetRequest> {
        self.state.lock().reset_requests.clone()
    }
}

#[async_trait]
impl MachineClient for FakeMachine {
    async fn etcd_member_list(&self) -> Result<EtcdMemberListResponse, ApiError> {
        let mut state = self.state.lock();
        state.member_list_calls += 1;

        if let Some(err) = state.member_list_failures.pop_front() {
            return Err(err);
        }

        let members = if state.bootstrapped {
            vec![EtcdMember { id: 1, hostname: "controlplane-1".to_string() }]
        } else {
            Vec::new()
        };
        Ok(EtcdMemberListResponse { messages: vec![EtcdMembers { members }] })
    }

    async fn bootstrap(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.bootstrap_calls += 1;

        if let Some(err) = state.bootstrap_failures.pop_front() {
            return Err(err);
        }
        if state.bootstrapped {
            return Err(ApiError::Status {
                code: 409,
                message: "etcd data directory is not empty".to_string(),
            });
        }

        state.bootstrapped = true;
        Ok(())
    }

    async fn reset(&self, request: &ResetRequest) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.reset_requests.push(request.clone());

        match &state.reset_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn machine_status(&self) -> Result<NodeStatus, ApiError> {
        self.state.lock().status.clone()
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    machines: HashMap<String, FakeMachine>,
    connect_failures: HashMap<String, usize>,
    connects: HashMap<String, u32>,
}

/// Resolves hosts to fake machines. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    /// Creates a connector with no reachable hosts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `machine` reachable at `host`.
    pub fn add(&self, host: impl Into<String>, machine: FakeMachine) {
        self.state.lock().machines.insert(host.into(), machine);
    }

    /// Makes the next `count` connections to `host` fail.
    pub fn fail_connects(&self, host: impl Into<String>, count: usize) {
        *self.state.lock().connect_failures.entry(host.into()).or_default() += count;
    }

    /// Number of connection attempts made to `host`.
    #[must_use]
    pub fn connects(&self, host: &str) -> u32 {
        self.state.lock().connects.get(host).copied().unwrap_or(0)
    }

    /// Total connection attempts across all hosts.
    #[must_use]
    pub fn total_connects(&self) -> u32 {
        self.state.lock().connects.values().sum()
    }
}

#[async_trait]
impl NodeConnector for FakeConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn MachineClient>, ConnectionError> {
        let mut state = self.state.lock();
        *state.connects.entry(host.to_string()).or_default() += 1;

        if let Some(remaining) = state.connect_failures.get_mut(host) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ConnectionError::Unreachable {
                    host: host.to_string(),
                    message: "connection refused".to_string(),
                });
            }
        }

        match state.machines.get(host) {
            Some(machine) => Ok(Box::new(machine.clone())),
            None => Err(ConnectionError::Unreachable {
                host: host.to_string(),
                message: "no such node".to_string(),
            }),
        }
    }
}

/// Confirmer that declines a fixed set of hosts and records every prompt.
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    declined: HashSet<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    /// Creates a confirmer that approves everything.
    #[must_use]
    pub fn approve_all() -> Self {
        Self::default()
    }

    /// Creates a confirmer that declines prompts naming any of `hosts`
    /// as a whole word.
    #[must_use]
    pub fn decline<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { declined: hosts.into_iter().map(Into::into).collect(), ..Default::default() }
    }

    /// Prompts shown so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        self.prompts.lock().push(message.to_string());
        !message.split_whitespace().any(|word| self.declined.contains(word))
    }
}
