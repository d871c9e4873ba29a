// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Per-node state.
//!
//! A [`Node`] pairs a topology entry (borrowed from the configuration that
//! owns it) with the runtime status last queried from the node. The status
//! is only trustworthy right after a successful [`Node::refresh`]; a failed
//! refresh keeps the previous status and records the error instead.

use std::sync::Arc;

use keel_core::{MachineStage, NodeEntry, NodeStatus, Role};
use serde::ser::{Serialize, Serializer};
use tracing::{debug, info_span, Span};

use crate::client::{MachineClient, NodeConnector};
use crate::error::{ConnectionError, NodeError};

/// Runtime state of one node.
pub struct Node<'a> {
    entry: &'a NodeEntry,
    connector: Arc<dyn NodeConnector>,
    status: NodeStatus,
    last_error: Option<NodeError>,
}

impl<'a> Node<'a> {
    /// Creates a node with no runtime status yet.
    pub fn new(entry: &'a NodeEntry, connector: Arc<dyn NodeConnector>) -> Self {
        Self { entry, connector, status: NodeStatus::default(), last_error: None }
    }

    /// Sets the runtime status without querying the node.
    #[must_use]
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns the topology entry.
    #[must_use]
    pub fn entry(&self) -> &'a NodeEntry {
        self.entry
    }

    /// Returns the node's address, which is also its identity.
    #[must_use]
    pub fn host(&self) -> &'a str {
        &self.entry.host
    }

    /// Returns the node's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.entry.role
    }

    /// Returns the last known runtime status.
    #[must_use]
    pub fn status(&self) -> &NodeStatus {
        &self.status
    }

    /// Returns the error from the last refresh, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&NodeError> {
        self.last_error.as_ref()
    }

    /// Returns true if the node was last seen in maintenance.
    #[must_use]
    pub fn is_in_maintenance(&self) -> bool {
        self.status.stage == MachineStage::Maintenance
    }

    /// Returns a span that tags log events with this node.
    #[must_use]
    pub fn span(&self) -> Span {
        info_span!("node", node = %self.entry.host)
    }

    /// Opens a management API handle to this node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be reached.
    pub async fn client(&self) -> Result<Box<dyn MachineClient>, ConnectionError> {
        self.connector.connect(&self.entry.host).await
    }

    /// Queries the node and replaces the stored status.
    ///
    /// On failure the previous status is kept and the error is recorded in
    /// [`Node::last_error`] as well as returned.
    ///
    /// # Errors
    ///
    /// Returns the connection or API error that prevented the query.
    pub async fn refresh(&mut self) -> Result<(), NodeError> {
        let result = self.query_status().await;

        match result {
            Ok(status) => {
                debug!(node = %self.entry.host, stage = %status.stage, "Refreshed node status");
                self.status = status;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn query_status(&self) -> Result<NodeStatus, NodeError> {
        let client = self.client().await?;
        let status = client.machine_status().await?;
        Ok(status)
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("entry", self.entry)
            .field("status", &self.status)
            .field("last_error", &self.last_error)
            .finish()
    }
}

/// Serialized as `{node, stage, schematic, os_version, error?}`.
///
/// The error is rendered as its message and left out entirely when unset.
impl Serialize for Node<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct Projection<'n> {
            node: &'n NodeEntry,
            #[serde(flatten)]
            status: &'n NodeStatus,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<String>,
        }

        Projection {
            node: self.entry,
            status: &self.status,
            error: self.last_error.as_ref().map(ToString::to_string),
        }
        .serialize(serializer)
    }
}
