// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Node topology and runtime status types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a node within the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Role {
    /// Runs the consensus store and the control services.
    #[serde(rename = "controlplane", alias = "control-plane")]
    ControlPlane,
    /// Runs workloads only.
    #[default]
    #[serde(rename = "worker")]
    Worker,
}

impl Role {
    /// Returns the role as it appears in configuration files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ControlPlane => "controlplane",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as declared in the cluster topology.
///
/// The host doubles as the node's identity: a topology never holds two
/// entries with the same host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Address of the node's management endpoint (`host` or `host:port`).
    pub host: String,
    /// Role of the node.
    #[serde(default)]
    pub role: Role,
}

impl NodeEntry {
    /// Creates a new topology entry.
    #[must_use]
    pub fn new(host: impl Into<String>, role: Role) -> Self {
        Self { host: host.into(), role }
    }

    /// Creates a control-plane entry.
    #[must_use]
    pub fn control_plane(host: impl Into<String>) -> Self {
        Self::new(host, Role::ControlPlane)
    }

    /// Creates a worker entry.
    #[must_use]
    pub fn worker(host: impl Into<String>) -> Self {
        Self::new(host, Role::Worker)
    }

    /// Returns the address clients use to reach this node.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.host
    }

    /// Returns true if the node is part of the control plane.
    #[must_use]
    pub fn is_control_plane(&self) -> bool {
        self.role == Role::ControlPlane
    }
}

/// Lifecycle stage reported by a node's management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MachineStage {
    /// The OS is booting.
    Booting,
    /// The OS is being installed to disk.
    Installing,
    /// No workload configuration is applied.
    Maintenance,
    /// The node is configured and running.
    Running,
    /// The node is rebooting.
    Rebooting,
    /// The node is shutting down.
    ShuttingDown,
    /// The node is wiping its state.
    Resetting,
    /// The node is upgrading its OS.
    Upgrading,
    /// Stage has not been observed, or is not one this build knows.
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for MachineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Booting => "booting",
            Self::Installing => "installing",
            Self::Maintenance => "maintenance",
            Self::Running => "running",
            Self::Rebooting => "rebooting",
            Self::ShuttingDown => "shutting_down",
            Self::Resetting => "resetting",
            Self::Upgrading => "upgrading",
        };
        f.write_str(s)
    }
}

/// Runtime status of a node, as last queried from its management API.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    /// Current lifecycle stage.
    pub stage: MachineStage,
    /// Identifier of the OS image schematic.
    pub schematic: String,
    /// Installed OS version.
    pub os_version: String,
}
