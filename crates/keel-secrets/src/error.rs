// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Error types for secrets storage.

use std::path::PathBuf;

use thiserror::Error;

/// A specialized `Result` type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors raised by the external encryption tool.
#[derive(Debug, Error)]
pub enum EncryptorError {
    /// The tool could not be started (usually: not installed).
    #[error("encryption tool {tool} is unavailable: {source}")]
    Unavailable {
        /// Name of the tool binary.
        tool: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but exited unsuccessfully.
    #[error("{tool} {operation} failed: {stderr}")]
    Failed {
        /// Name of the tool binary.
        tool: String,
        /// Operation that failed (filestatus, decrypt, encrypt).
        operation: &'static str,
        /// Captured standard error.
        stderr: String,
    },

    /// The tool produced output that could not be understood.
    #[error("unexpected output from {tool}: {message}")]
    InvalidOutput {
        /// Name of the tool binary.
        tool: String,
        /// Description of the problem.
        message: String,
    },

    /// Encryption is disabled for this store.
    #[error("encryption is disabled")]
    Disabled,
}

/// Errors that can occur while reading or writing a secrets bundle.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// The bundle file could not be read.
    #[error("failed to read secrets from {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The bundle file could not be written.
    #[error("failed to write secrets to {path}: {source}")]
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The stored bundle is encrypted and could not be decrypted.
    #[error("failed to decrypt secrets: {0}")]
    Decrypt(#[source] EncryptorError),

    /// The bundle could not be encrypted and plaintext fallback is disabled.
    #[error("failed to encrypt secrets: {0}")]
    Encrypt(#[source] EncryptorError),
}
