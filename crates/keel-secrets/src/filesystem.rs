// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Keel Authors

//! Filesystem-backed secrets store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use keel_core::SecretsConfig;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::encryptor::{Encryptor, NoEncryption, SopsEncryptor};
use crate::error::{EncryptorError, Result, SecretsError};
use crate::SecretsStore;

/// Stores the secrets bundle in a single file.
///
/// Reads transparently decrypt files the encryptor reports as encrypted.
/// Writes try to encrypt first; when the encryptor is missing or fails,
/// the bundle is written in plaintext unless the fallback was disabled
/// with [`FilesystemSecretsStore::with_plaintext_fallback`].
///
/// The file is created with owner-only permissions. There is no
/// cross-process locking: concurrent writers race.
pub struct FilesystemSecretsStore {
    path: PathBuf,
    encryptor: Arc<dyn Encryptor>,
    allow_plaintext_fallback: bool,
}

impl FilesystemSecretsStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>, encryptor: Arc<dyn Encryptor>) -> Self {
        Self { path: path.into(), encryptor, allow_plaintext_fallback: true }
    }

    /// Creates a store from the `[secrets]` configuration section.
    ///
    /// An empty `encryption_tool` disables encryption entirely.
    #[must_use]
    pub fn from_config(config: &SecretsConfig) -> Self {
        let encryptor: Arc<dyn Encryptor> = if config.encryption_tool.trim().is_empty() {
            Arc::new(NoEncryption)
        } else {
            Arc::new(SopsEncryptor::new(config.encryption_tool.clone()))
        };

        Self::new(config.path.clone(), encryptor)
            .with_plaintext_fallback(config.allow_plaintext_fallback)
    }

    /// Sets whether a failed encryption may fall back to a plaintext write.
    #[must_use]
    pub fn with_plaintext_fallback(mut self, allow: bool) -> Self {
        self.allow_plaintext_fallback = allow;
        self
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self.path.file_name().map(|n| n.to_string_lossy().into_owned());
        let temp_name = format!(".{}.tmp", name.as_deref().unwrap_or("secrets"));
        self.path.with_file_name(temp_name)
    }

    async fn write_file(&self, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        // Rename is atomic on the same filesystem; readers never see a
        // partially written bundle.
        fs::rename(&temp_path, &self.path).await
    }
}

impl std::fmt::Debug for FilesystemSecretsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemSecretsStore")
            .field("path", &self.path)
            .field("encryptor", &self.encryptor.name())
            .field("allow_plaintext_fallback", &self.allow_plaintext_fallback)
            .finish()
    }
}

#[async_trait]
impl SecretsStore for FilesystemSecretsStore {
    async fn get(&self, _id: &str) -> Result<Option<Bytes>> {
        match fs::metadata(&self.path).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SecretsError::Read { path: self.path.clone(), source }),
        }

        // Treat a failing status check as "not encrypted": the tool may simply
        // be absent on a machine that only ever stored plaintext.
        let encrypted = match self.encryptor.file_status(&self.path).await {
            Ok(status) => status.encrypted,
            Err(e) => {
                debug!(error = %e, "Encryption status unavailable, reading as plaintext");
                false
            }
        };

        if !encrypted {
            let data = fs::read(&self.path)
                .await
                .map_err(|source| SecretsError::Read { path: self.path.clone(), source })?;
            return Ok(Some(Bytes::from(data)));
        }

        self.encryptor.decrypt(&self.path).await.map(Some).map_err(SecretsError::Decrypt)
    }

    async fn put(&self, _id: &str, bundle: Bytes) -> Result<()> {
        let contents = match self.encryptor.encrypt(&bundle, &self.path).await {
            Ok(encrypted) => encrypted,
            Err(EncryptorError::Disabled) => bundle,
            Err(e) if self.allow_plaintext_fallback => {
                warn!(
                    path = %self.path.display(),
                    tool = self.encryptor.name(),
                    error = %e,
                    "Encryption failed, writing secrets in plaintext"
                );
                bundle
            }
            Err(e) => return Err(SecretsError::Encrypt(e)),
        };

        self.write_file(&contents)
            .await
            .map_err(|source| SecretsError::Write { path: self.path.clone(), source })?;

        debug!(path = %self.path.display(), bytes = contents.len(), "Secrets bundle written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tempfile::TempDir;

    use super::*;
    use crate::encryptor::FileStatus;

    /// Encryptor that prefixes ciphertext with a marker.
    #[derive(Default)]
    struct PrefixEncryptor {
        decrypts: AtomicUsize,
    }

    const MARKER: &[u8] = b"ENC:";

    #[async_trait]
    impl Encryptor for PrefixEncryptor {
        fn name(&self) -> &str {
            "prefix"
        }

        async fn file_status(&self, path: &Path) -> std::result::Result<FileStatus, EncryptorError> {
            let data = std::fs::read(path).unwrap();
            Ok(FileStatus { encrypted: data.starts_with(MARKER) })
        }

        async fn decrypt(&self, path: &Path) -> std::result::Result<Bytes, EncryptorError> {
            self.decrypts.fetch_add(1, Ordering::SeqCst);
            let data = std::fs::read(path).unwrap();
            Ok(Bytes::copy_from_slice(&data[MARKER.len()..]))
        }

        async fn encrypt(
            &self,
            plaintext: &[u8],
            _path: &Path,
        ) -> std::result::Result<Bytes, EncryptorError> {
            let mut out = MARKER.to_vec();
            out.extend_from_slice(plaintext);
            Ok(Bytes::from(out))
        }
    }

    /// Encryptor whose tool is never installed.
    struct BrokenEncryptor;

    #[async_trait]
    impl Encryptor for BrokenEncryptor {
        fn name(&self) -> &str {
            "broken"
        }

        async fn file_status(&self, _path: &Path) -> std::result::Result<FileStatus, EncryptorError> {
            Err(EncryptorError::Failed {
                tool: "broken".to_string(),
                operation: "filestatus",
                stderr: "not installed".to_string(),
            })
        }

        async fn decrypt(&self, _path: &Path) -> std::result::Result<Bytes, EncryptorError> {
            unreachable!("plaintext files are never decrypted")
        }

        async fn encrypt(
            &self,
            _plaintext: &[u8],
            _path: &Path,
        ) -> std::result::Result<Bytes, EncryptorError> {
            Err(EncryptorError::Failed {
                tool: "broken".to_string(),
                operation: "encrypt",
                stderr: "not installed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSecretsStore::new(dir.path().join("secrets.yaml"), Arc::new(NoEncryption));

        assert!(store.get("cluster").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_bundle_is_not_missing() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemSecretsStore::new(dir.path().join("secrets.yaml"), Arc::new(NoEncryption));

        store.put("cluster", Bytes::new()).await.unwrap();
        let bundle = store.get("cluster").await.unwrap();
        assert_eq!(bundle, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn test_plaintext_round_trip_without_tool() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yaml");
        let store = FilesystemSecretsStore::new(&path, Arc::new(BrokenEncryptor));

        let bundle = Bytes::from_static(b"cluster:\n  id: abc123\n");
        store.put("cluster", bundle.clone()).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), bundle.to_vec());
        assert_eq!(store.get("cluster").await.unwrap(), Some(bundle));
    }

    #[tokio::test]
    async fn test_encrypted_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yaml");
        let encryptor = Arc::new(PrefixEncryptor::default());
        let store = FilesystemSecretsStore::new(&path, encryptor.clone());

        let bundle = Bytes::from_static(b"certs: {}\n");
        store.put("cluster", bundle.clone()).await.unwrap();

        let on_disk = std::fs::read(&path).unwrap();
        assert!(on_disk.starts_with(MARKER));

        assert_eq!(store.get("cluster").await.unwrap(), Some(bundle));
        assert_eq!(encryptor.decrypts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_disabled_fails_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yaml");
        let store = FilesystemSecretsStore::new(&path, Arc::new(BrokenEncryptor))
            .with_plaintext_fallback(false);

        let err = store.put("cluster", Bytes::from_static(b"secret")).await.unwrap_err();
        assert!(matches!(err, SecretsError::Encrypt(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_put_creates_parent_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cluster").join("secrets.yaml");
        let store = FilesystemSecretsStore::new(&path, Arc::new(NoEncryption));

        store.put("cluster", Bytes::from_static(b"first")).await.unwrap();
        store.put("cluster", Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(store.get("cluster").await.unwrap(), Some(Bytes::from_static(b"second")));
        assert!(!store.temp_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yaml");
        let store = FilesystemSecretsStore::new(&path, Arc::new(NoEncryption));

        store.put("cluster", Bytes::from_static(b"secret")).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_from_config() {
        let config = SecretsConfig {
            path: PathBuf::from("custom/secrets.yaml"),
            encryption_tool: String::new(),
            allow_plaintext_fallback: false,
        };
        let store = FilesystemSecretsStore::from_config(&config);

        assert_eq!(store.path(), Path::new("custom/secrets.yaml"));
        assert_eq!(store.encryptor.name(), "none");
        assert!(!store.allow_plaintext_fallback);
    }
}
