// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Node lifecycle orchestration for Keel.
//!
//! This crate provides:
//! - The management API abstraction ([`NodeConnector`], [`MachineClient`])
//!   and an HTTP implementation
//! - Per-node runtime state ([`Node`])
//! - The bootstrap protocol: check membership, bootstrap if empty, retry
//!   under a time budget
//! - The reset fan-out: per-node confirm and reset with an outcome tally
//! - Client access bundle generation from the cluster secrets
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keel_cluster::{BootstrapOrchestrator, Cluster, HttpConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! let connector = Arc::new(HttpConnector::new(config.api.clone()));
//! let cluster = Cluster::new(config, connector, secrets);
//!
//! let nodes = cluster.node_states()?;
//! let orchestrator = BootstrapOrchestrator::from_config(&cluster.config().bootstrap);
//! orchestrator.run(&nodes, &CancellationToken::new()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod access;
pub mod bootstrap;
pub mod client;
pub mod cluster;
pub mod error;
pub mod http;
pub mod node;
pub mod reset;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use access::{
    apply_topology, build_access_config, AccessConfig, AccessContext, ConfigGenerator,
    DefaultConfigGenerator, DEFAULT_ENDPOINT,
};
pub use bootstrap::{BootstrapOrchestrator, BootstrapOutcome};
pub use client::{
    EtcdMember, EtcdMemberListResponse, EtcdMembers, MachineClient, NodeConnector,
    ResetPartitionSpec, ResetRequest, EPHEMERAL_PARTITION, STATE_PARTITION,
};
pub use cluster::Cluster;
pub use error::{
    ApiError, BootstrapError, ClusterError, ConnectionError, GenerateError, NodeError,
};
pub use http::{HttpConnector, HttpMachineClient};
pub use node::Node;
pub use reset::{
    wipe_partitions, AutoApprove, Confirmer, ResetOptions, ResetOrchestrator, ResetTally,
};
pub use retry::{Attempt, ConstantRetry, RetryError};
