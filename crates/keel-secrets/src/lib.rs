// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Cluster secrets storage for Keel.
//!
//! This crate provides:
//! - The [`SecretsStore`] trait used to load and persist the cluster secrets
//!   bundle
//! - A filesystem-backed store with transparent at-rest encryption
//! - The [`Encryptor`] capability wrapping an external encryption tool
//!   (`sops`), plus a no-op implementation
//!
//! The secrets bundle is opaque: nothing in this crate interprets its bytes.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keel_secrets::{FilesystemSecretsStore, SecretsStore, SopsEncryptor};
//!
//! let store = FilesystemSecretsStore::new("secrets.yaml", Arc::new(SopsEncryptor::default()));
//! store.put("cluster", bundle).await?;
//! let bundle = store.get("cluster").await?.expect("bundle was just written");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod encryptor;
pub mod error;
pub mod filesystem;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

pub use encryptor::{Encryptor, FileStatus, NoEncryption, SopsEncryptor};
pub use error::{EncryptorError, Result, SecretsError};
pub use filesystem::FilesystemSecretsStore;
pub use memory::MemorySecretsStore;

/// Storage for cluster secrets bundles.
///
/// `get` returns `Ok(None)` when no bundle has been stored, which callers
/// must keep distinct from an empty bundle.
#[async_trait]
pub trait SecretsStore: Send + Sync {
    /// Loads the bundle stored under `id`.
    async fn get(&self, id: &str) -> Result<Option<Bytes>>;

    /// Persists `bundle` under `id`, replacing any previous bundle.
    async fn put(&self, id: &str, bundle: Bytes) -> Result<()>;
}
