// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! In-memory secrets store.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::SecretsStore;

/// Keeps secrets bundles in memory, keyed by id.
///
/// Used in tests and for one-shot invocations that must not touch disk.
#[derive(Debug, Default)]
pub struct MemorySecretsStore {
    bundles: RwLock<HashMap<String, Bytes>>,
}

impl MemorySecretsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one bundle.
    #[must_use]
    pub fn with_bundle(id: impl Into<String>, bundle: impl Into<Bytes>) -> Self {
        let mut bundles = HashMap::new();
        bundles.insert(id.into(), bundle.into());
        Self { bundles: RwLock::new(bundles) }
    }
}

#[async_trait]
impl SecretsStore for MemorySecretsStore {
    async fn get(&self, id: &str) -> Result<Option<Bytes>> {
        Ok(self.bundles.read().await.get(id).cloned())
    }

    async fn put(&self, id: &str, bundle: Bytes) -> Result<()> {
        self.bundles.write().await.insert(id.to_string(), bundle);
        Ok(())
    }
}
