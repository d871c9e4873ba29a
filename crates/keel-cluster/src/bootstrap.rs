// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Consensus store bootstrap.
//!
//! Bootstrap runs against the first node of the topology, which must be a
//! control-plane node. Each attempt opens a fresh connection, checks the
//! membership list and only issues the bootstrap command when no member is
//! reported yet, so re-running against an initialized cluster is a no-op.
//!
//! Every remote failure is retried at a constant interval until the time
//! budget runs out.

use keel_core::BootstrapConfig;
use metrics::counter;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::error::{BootstrapError, NodeError};
use crate::node::Node;
use crate::retry::{Attempt, ConstantRetry, RetryError};

/// How a successful bootstrap run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BootstrapOutcome {
    /// The store already had members; no bootstrap command was sent.
    AlreadyBootstrapped {
        /// Member count reported by the node.
        members: usize,
    },
    /// The bootstrap command was accepted.
    Bootstrapped,
}

impl std::fmt::Display for BootstrapOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyBootstrapped { members } => {
                write!(f, "already bootstrapped ({members} members)")
            }
            Self::Bootstrapped => f.write_str("bootstrapped"),
        }
    }
}

/// Drives the bootstrap protocol.
#[derive(Debug, Clone)]
pub struct BootstrapOrchestrator {
    retry: ConstantRetry,
}

impl Default for BootstrapOrchestrator {
    fn default() -> Self {
        Self::from_config(&BootstrapConfig::default())
    }
}

impl BootstrapOrchestrator {
    /// Creates an orchestrator with an explicit retry policy.
    #[must_use]
    pub const fn new(retry: ConstantRetry) -> Self {
        Self { retry }
    }

    /// Creates an orchestrator from the `[bootstrap]` configuration.
    #[must_use]
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(ConstantRetry::new(config.timeout(), config.retry_interval()))
    }

    /// Bootstraps the consensus store on the first node in `nodes`.
    ///
    /// # Errors
    ///
    /// - [`BootstrapError::Config`] if `nodes` is empty or its first node is
    ///   not a control-plane node. No node is contacted.
    /// - [`BootstrapError::Failed`] once the time budget is exhausted.
    /// - [`BootstrapError::Cancelled`] if `cancel` fires first.
    pub async fn run(
        &self,
        nodes: &[Node<'_>],
        cancel: &CancellationToken,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        let target = match nodes.first() {
            None => return Err(BootstrapError::Config("no nodes configured".to_string())),
            Some(node) if !node.entry().is_control_plane() => {
                return Err(BootstrapError::Config(format!(
                    "first node {} has role {}",
                    node.host(),
                    node.role()
                )));
            }
            Some(node) => node,
        };

        info!(
            node = %target.host(),
            timeout_secs = self.retry.budget().as_secs(),
            "Starting bootstrap"
        );

        let result = self
            .retry
            .run(cancel, |attempt| Self::attempt(target, attempt).instrument(target.span()))
            .await;

        match result {
            Ok(outcome) => {
                info!(node = %target.host(), %outcome, "Bootstrap completed");
                Ok(outcome)
            }
            Err(RetryError::Exhausted { last, attempts }) => {
                Err(BootstrapError::Failed { attempts, last })
            }
            // Every attempt failure is classified as expected.
            Err(RetryError::Fatal(last)) => Err(BootstrapError::Failed { attempts: 1, last }),
            Err(RetryError::Cancelled) => {
                info!(node = %target.host(), "Bootstrap cancelled");
                Err(BootstrapError::Cancelled)
            }
        }
    }

    async fn attempt(node: &Node<'_>, attempt: u32) -> Result<BootstrapOutcome, Attempt<NodeError>> {
        counter!("keel_bootstrap_attempts_total").increment(1);

        let client = node.client().await.map_err(|e| Attempt::Expected(e.into()))?;

        match client.etcd_member_list().await {
            Ok(response) if response.is_bootstrapped() => {
                let members = response.member_count();
                info!(members, "Consensus store already bootstrapped");
                return Ok(BootstrapOutcome::AlreadyBootstrapped { members });
            }
            Ok(_) => debug!(attempt, "No consensus store members yet"),
            Err(e) => debug!(attempt, error = %e, "Membership query failed, bootstrapping anyway"),
        }

        client.bootstrap().await.map_err(|e| Attempt::Expected(e.into()))?;
        Ok(BootstrapOutcome::Bootstrapped)
    }
}
