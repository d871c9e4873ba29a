// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Error types for node orchestration.

use keel_secrets::SecretsError;
use thiserror::Error;

/// Failure to obtain a handle to a node's management API.
///
/// Always transient from the connector's point of view: callers decide
/// whether to retry, skip or record it.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The node address could not be turned into an endpoint.
    #[error("invalid node address {host}: {message}")]
    InvalidAddress {
        /// Host as written in the topology.
        host: String,
        /// Why the address was rejected.
        message: String,
    },

    /// The node could not be reached.
    #[error("node {host} is unreachable: {message}")]
    Unreachable {
        /// Host as written in the topology.
        host: String,
        /// Transport error description.
        message: String,
    },
}

/// Failure of a single management API call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with an error status.
    #[error("request rejected with status {code}: {message}")]
    Status {
        /// Status code returned by the node.
        code: u16,
        /// Response body or reason.
        message: String,
    },

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Any failure talking to a node: connecting or calling.
#[derive(Debug, Clone, Error)]
pub enum NodeError {
    /// Connecting failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors from the configuration generator.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The secrets bundle is empty.
    #[error("secrets bundle is empty")]
    EmptySecrets,

    /// The secrets bundle is not a valid document.
    #[error("invalid secrets bundle: {0}")]
    InvalidSecrets(String),

    /// The generated bundle has no context for the cluster.
    #[error("generated access config has no context named {0}")]
    MissingContext(String),

    /// The access config could not be serialized.
    #[error("failed to serialize access config: {0}")]
    Serialize(String),
}

/// Errors that abort a whole cluster-level operation.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The topology is unusable.
    #[error("invalid topology: {0}")]
    Topology(#[from] keel_core::Error),

    /// The secrets store failed.
    #[error(transparent)]
    Secrets(#[from] SecretsError),

    /// No secrets bundle has been stored for the cluster.
    #[error("no secrets bundle stored for cluster {0}")]
    MissingSecrets(String),

    /// The access config could not be generated.
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Errors from the bootstrap protocol.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The node set cannot be bootstrapped. Never retried.
    #[error("bootstrap requires at least 1 control plane node: {0}")]
    Config(String),

    /// The retry budget ran out.
    #[error("bootstrap failed after {attempts} attempts: {last}")]
    Failed {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: NodeError,
    },

    /// The operation was cancelled while waiting to retry.
    #[error("bootstrap cancelled")]
    Cancelled,
}
