// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Error types for Keel configuration handling.

use thiserror::Error;

/// A specialized `Result` type for Keel core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or validating cluster configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A host appears more than once in the topology.
    #[error("duplicate node host in topology: {0}")]
    DuplicateHost(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error was caused by invalid configuration
    /// rather than by the environment.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Parse(_) | Self::DuplicateHost(_))
    }
}
