// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! External encryption tool capability.
//!
//! The filesystem store never encrypts on its own. It delegates to an
//! [`Encryptor`], which in production shells out to `sops`:
//!
//! - `sops filestatus <path>` prints `{"encrypted": bool}`
//! - `sops decrypt <path>` prints the plaintext
//! - `sops encrypt --filename-override <path>` reads plaintext on stdin and
//!   prints the encrypted document; the override lets `.sops.yaml` creation
//!   rules match the final file name

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::EncryptorError;

/// Encryption state of a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct FileStatus {
    /// Whether the file is encrypted.
    pub encrypted: bool,
}

/// Capability to inspect, decrypt and encrypt secrets files.
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Returns a short name for logging.
    fn name(&self) -> &str;

    /// Reports whether the file at `path` is encrypted.
    async fn file_status(&self, path: &Path) -> Result<FileStatus, EncryptorError>;

    /// Decrypts the file at `path` and returns the plaintext.
    async fn decrypt(&self, path: &Path) -> Result<Bytes, EncryptorError>;

    /// Encrypts `plaintext` as if it were stored at `path`.
    async fn encrypt(&self, plaintext: &[u8], path: &Path) -> Result<Bytes, EncryptorError>;
}

/// Encryptor backed by the `sops` command line tool.
#[derive(Debug, Clone)]
pub struct SopsEncryptor {
    binary: String,
}

impl Default for SopsEncryptor {
    fn default() -> Self {
        Self::new("sops")
    }
}

impl SopsEncryptor {
    /// Creates an encryptor that runs the given binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, source: std::io::Error) -> EncryptorError {
        EncryptorError::Unavailable { tool: self.binary.clone(), source }
    }

    fn check_status(
        &self,
        operation: &'static str,
        output: std::process::Output,
    ) -> Result<Vec<u8>, EncryptorError> {
        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(EncryptorError::Failed {
            tool: self.binary.clone(),
            operation,
            stderr: if stderr.is_empty() {
                format!("exit code {}", output.status.code().unwrap_or(-1))
            } else {
                stderr
            },
        })
    }
}

#[async_trait]
impl Encryptor for SopsEncryptor {
    fn name(&self) -> &str {
        &self.binary
    }

    async fn file_status(&self, path: &Path) -> Result<FileStatus, EncryptorError> {
        let output = self
            .command()
            .arg("filestatus")
            .arg(path)
            .output()
            .await
            .map_err(|e| self.unavailable(e))?;

        let stdout = self.check_status("filestatus", output)?;
        serde_json::from_slice(&stdout).map_err(|e| EncryptorError::InvalidOutput {
            tool: self.binary.clone(),
            message: e.to_string(),
        })
    }

    async fn decrypt(&self, path: &Path) -> Result<Bytes, EncryptorError> {
        debug!(path = %path.display(), tool = %self.binary, "Decrypting secrets file");

        let output = self
            .command()
            .arg("decrypt")
            .arg(path)
            .output()
            .await
            .map_err(|e| self.unavailable(e))?;

        self.check_status("decrypt", output).map(Bytes::from)
    }

    async fn encrypt(&self, plaintext: &[u8], path: &Path) -> Result<Bytes, EncryptorError> {
        debug!(path = %path.display(), tool = %self.binary, "Encrypting secrets bundle");

        let mut child = self
            .command()
            .arg("encrypt")
            .arg("--filename-override")
            .arg(path)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| self.unavailable(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(plaintext).await.map_err(|e| self.unavailable(e))?;
            // Dropping stdin closes the pipe so the tool sees EOF.
        }

        let output = child.wait_with_output().await.map_err(|e| self.unavailable(e))?;
        self.check_status("encrypt", output).map(Bytes::from)
    }
}

/// Encryptor that never encrypts.
///
/// Every file reads as plaintext; every encryption request fails with
/// [`EncryptorError::Disabled`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryption;

#[async_trait]
impl Encryptor for NoEncryption {
    fn name(&self) -> &str {
        "none"
    }

    async fn file_status(&self, _path: &Path) -> Result<FileStatus, EncryptorError> {
        Ok(FileStatus { encrypted: false })
    }

    async fn decrypt(&self, _path: &Path) -> Result<Bytes, EncryptorError> {
        Err(EncryptorError::Disabled)
    }

    async fn encrypt(&self, _plaintext: &[u8], _path: &Path) -> Result<Bytes, EncryptorError> {
        Err(EncryptorError::Disabled)
    }
}
