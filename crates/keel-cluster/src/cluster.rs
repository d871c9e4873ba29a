// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Cluster handle: topology plus the collaborators needed to act on it.

use std::sync::Arc;

use bytes::Bytes;
use keel_core::Config;
use keel_secrets::SecretsStore;
use tracing::{debug, warn};

use crate::client::NodeConnector;
use crate::error::ClusterError;
use crate::node::Node;

/// A configured cluster.
///
/// Node states are created per call and borrow their topology entries from
/// this handle, so they cannot outlive it.
pub struct Cluster {
    config: Config,
    connector: Arc<dyn NodeConnector>,
    secrets: Arc<dyn SecretsStore>,
}

impl Cluster {
    /// Creates a cluster handle.
    pub fn new(
        config: Config,
        connector: Arc<dyn NodeConnector>,
        secrets: Arc<dyn SecretsStore>,
    ) -> Self {
        Self { config, connector, secrets }
    }

    /// Returns the cluster configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the cluster name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.cluster_name
    }

    /// Returns the secrets store.
    #[must_use]
    pub fn secrets_store(&self) -> &Arc<dyn SecretsStore> {
        &self.secrets
    }

    /// Builds a node state per topology entry without contacting any node.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology is invalid.
    pub fn node_states(&self) -> Result<Vec<Node<'_>>, ClusterError> {
        self.config.validate()?;

        Ok(self.config.nodes.iter().map(|entry| Node::new(entry, self.connector.clone())).collect())
    }

    /// Builds the node states and refreshes each of them.
    ///
    /// A node that cannot be refreshed is kept with its error recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology is invalid.
    pub async fn nodes(&self) -> Result<Vec<Node<'_>>, ClusterError> {
        let mut nodes = self.node_states()?;

        for node in &mut nodes {
            match node.refresh().await {
                Ok(()) => debug!(node = %node.host(), "Gathered node state"),
                Err(e) => warn!(node = %node.host(), error = %e, "Failed to query node status"),
            }
        }

        Ok(nodes)
    }

    /// Loads the cluster's secrets bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::MissingSecrets`] if nothing is stored, or the
    /// store's error if loading fails.
    pub async fn secrets(&self) -> Result<Bytes, ClusterError> {
        self.secrets
            .get(self.name())
            .await?
            .ok_or_else(|| ClusterError::MissingSecrets(self.name().to_string()))
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster").field("config", &self.config).finish_non_exhaustive()
    }
}
