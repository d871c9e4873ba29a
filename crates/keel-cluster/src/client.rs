// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Node management API abstraction.
//!
//! A [`NodeConnector`] turns a node address into a [`MachineClient`]
//! handle. Handles are scoped: they release their connection when
//! dropped, so every exit path (including `?`) releases them. Connectors
//! never pool or cache handles.

use async_trait::async_trait;
use keel_core::NodeStatus;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ConnectionError};

/// Label of the partition holding machine configuration.
pub const STATE_PARTITION: &str = "STATE";

/// Label of the partition holding workload data.
pub const EPHEMERAL_PARTITION: &str = "EPHEMERAL";

/// A consensus store member as reported by one node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtcdMember {
    /// Member identifier.
    pub id: u64,
    /// Member hostname.
    pub hostname: String,
}

/// Membership as seen by one responding node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtcdMembers {
    /// Members known to the node.
    pub members: Vec<EtcdMember>,
}

/// Response of a membership query; one message per responding node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtcdMemberListResponse {
    /// Per-node membership.
    pub messages: Vec<EtcdMembers>,
}

impl EtcdMemberListResponse {
    /// Returns the largest member count reported by any node.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.messages.iter().map(|m| m.members.len()).max().unwrap_or(0)
    }

    /// Returns true if any node reports at least one member.
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.member_count() > 0
    }
}

/// A partition to wipe during reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPartitionSpec {
    /// Partition label.
    pub label: String,
    /// Whether to wipe the partition.
    pub wipe: bool,
}

impl ResetPartitionSpec {
    /// Creates a spec that wipes the labelled partition.
    #[must_use]
    pub fn wipe(label: impl Into<String>) -> Self {
        Self { label: label.into(), wipe: true }
    }
}

/// Reset command.
///
/// An empty `system_partitions_to_wipe` asks the node to wipe every
/// partition; it does not mean "wipe nothing".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRequest {
    /// Partitions to wipe; empty for a full wipe.
    pub system_partitions_to_wipe: Vec<ResetPartitionSpec>,
    /// Stop services gracefully before wiping.
    pub graceful: bool,
    /// Reboot after reset; power off when false.
    pub reboot: bool,
}

/// Handle to one node's management API.
#[async_trait]
pub trait MachineClient: Send + Sync {
    /// Lists consensus store members.
    async fn etcd_member_list(&self) -> Result<EtcdMemberListResponse, ApiError>;

    /// Initializes the consensus store on this node.
    async fn bootstrap(&self) -> Result<(), ApiError>;

    /// Resets the node.
    async fn reset(&self, request: &ResetRequest) -> Result<(), ApiError>;

    /// Queries the node's runtime status.
    async fn machine_status(&self) -> Result<NodeStatus, ApiError>;
}

/// Opens management API handles.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Opens a handle to the node at `host`.
    async fn connect(&self, host: &str) -> Result<Box<dyn MachineClient>, ConnectionError>;
}
