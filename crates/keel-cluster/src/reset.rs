// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Reset fan-out.
//!
//! Every node in the topology is visited once, sequentially. Per node:
//!
//! 1. Nodes last seen in maintenance are skipped without a network call.
//! 2. An unreachable node is skipped. Connections are not retried.
//! 3. The wipe set is `{STATE, EPHEMERAL}`, or empty for a full wipe.
//! 4. With `confirm`, a declined prompt skips the node.
//! 5. The reset command is issued; its failure counts as a failure.
//!
//! A skip or failure on one node never stops the run. The tally is the
//! only result; the run itself fails only when the topology cannot be
//! gathered.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn, Instrument};

use crate::client::{ResetPartitionSpec, ResetRequest, EPHEMERAL_PARTITION, STATE_PARTITION};
use crate::cluster::Cluster;
use crate::error::ClusterError;
use crate::node::Node;

/// Options for a reset run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOptions {
    /// Ask before resetting each node.
    pub confirm: bool,
    /// Wipe every partition instead of just STATE and EPHEMERAL.
    pub full_wipe: bool,
    /// Stop services gracefully before wiping.
    pub graceful: bool,
    /// Power off after reset instead of rebooting.
    pub shutdown: bool,
}

/// Outcome counts of a reset run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetTally {
    /// Nodes that accepted the reset command.
    pub success_count: usize,
    /// Nodes left alone.
    pub skip_count: usize,
    /// Nodes that rejected the reset command.
    pub fail_count: usize,
}

impl ResetTally {
    /// Number of nodes visited.
    #[must_use]
    pub fn total(&self) -> usize {
        self.success_count + self.skip_count + self.fail_count
    }

    /// Returns true if no node failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.fail_count == 0
    }

    fn record(&mut self, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Success => self.success_count += 1,
            NodeOutcome::Skipped => self.skip_count += 1,
            NodeOutcome::Failed => self.fail_count += 1,
        }
        counter!("keel_reset_nodes_total", "outcome" => outcome.as_str()).increment(1);
    }
}

impl std::fmt::Display for ResetTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.success_count, self.skip_count, self.fail_count
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeOutcome {
    Success,
    Skipped,
    Failed,
}

impl NodeOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Answers yes/no prompts.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Shows `message` and returns true if the answer is yes.
    async fn confirm(&self, message: &str) -> bool;
}

/// Confirmer that approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Returns the partitions to wipe. An empty set means every partition.
#[must_use]
pub fn wipe_partitions(full_wipe: bool) -> Vec<ResetPartitionSpec> {
    if full_wipe {
        Vec::new()
    } else {
        vec![ResetPartitionSpec::wipe(STATE_PARTITION), ResetPartitionSpec::wipe(EPHEMERAL_PARTITION)]
    }
}

/// Drives a reset across a node set.
pub struct ResetOrchestrator {
    options: ResetOptions,
    confirmer: Arc<dyn Confirmer>,
}

impl ResetOrchestrator {
    /// Creates an orchestrator. `confirmer` is only consulted when
    /// `options.confirm` is set.
    pub fn new(options: ResetOptions, confirmer: Arc<dyn Confirmer>) -> Self {
        Self { options, confirmer }
    }

    /// Returns the run options.
    #[must_use]
    pub fn options(&self) -> &ResetOptions {
        &self.options
    }

    /// Gathers the cluster's nodes and resets each of them.
    ///
    /// # Errors
    ///
    /// Returns an error only if the topology is invalid; no tally is
    /// produced in that case.
    pub async fn run(&self, cluster: &Cluster) -> Result<ResetTally, ClusterError> {
        let nodes = cluster.nodes().await?;
        Ok(self.reset_nodes(&nodes).await)
    }

    /// Resets each node in turn, using the state gathered by the caller.
    pub async fn reset_nodes(&self, nodes: &[Node<'_>]) -> ResetTally {
        let mut tally = ResetTally::default();

        for node in nodes {
            let outcome = self.reset_node(node).instrument(node.span()).await;
            tally.record(outcome);
        }

        info!(
            success = tally.success_count,
            skipped = tally.skip_count,
            failed = tally.fail_count,
            "Reset finished"
        );
        tally
    }

    async fn reset_node(&self, node: &Node<'_>) -> NodeOutcome {
        if node.is_in_maintenance() {
            info!(node = %node.host(), "Node is already in maintenance, skipping");
            return NodeOutcome::Skipped;
        }

        let client = match node.client().await {
            Ok(client) => client,
            Err(e) => {
                warn!(node = %node.host(), error = %e, "Cannot connect to node, skipping");
                return NodeOutcome::Skipped;
            }
        };

        let request = ResetRequest {
            system_partitions_to_wipe: wipe_partitions(self.options.full_wipe),
            graceful: self.options.graceful,
            reboot: !self.options.shutdown,
        };

        if self.options.confirm {
            let prompt = format!("Do you want to reset {} ?", node.host());
            if !self.confirmer.confirm(&prompt).await {
                info!(node = %node.host(), "Reset declined, skipping");
                return NodeOutcome::Skipped;
            }
        }

        match client.reset(&request).await {
            Ok(()) => {
                info!(
                    node = %node.host(),
                    full_wipe = self.options.full_wipe,
                    reboot = request.reboot,
                    "Node reset"
                );
                NodeOutcome::Success
            }
            Err(e) => {
                warn!(node = %node.host(), error = %e, "Reset failed");
                NodeOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for ResetOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetOrchestrator").field("options", &self.options).finish_non_exhaustive()
    }
}
