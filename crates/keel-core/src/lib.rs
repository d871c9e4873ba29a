// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Core types and utilities for Keel.
//!
//! This crate provides the building blocks shared by every Keel component:
//! - Cluster configuration (topology, secrets, bootstrap, logging)
//! - Error types for configuration and I/O failures
//! - Node topology and runtime status types

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ApiConfig, BootstrapConfig, Config, LogFormat, LoggingConfig, MetricsConfig, SecretsConfig,
    DEFAULT_CONFIG_PATH,
};
pub use error::{Error, Result};
pub use types::{MachineStage, NodeEntry, NodeStatus, Role};
