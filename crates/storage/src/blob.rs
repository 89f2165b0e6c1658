//! Local-filesystem blob backend for attachment bytes.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::traits::BlobStore;

/// Stores blobs as files under a base directory. Keys are relative
/// slash-separated paths; anything trying to escape the base directory
/// is rejected.
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        LocalBlobStore {
            base_dir: base_dir.into(),
        }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key.trim_start_matches('/'));
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::Backend(format!(
                        "invalid blob key '{}'",
                        key
                    )))
                }
            }
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.full_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(StorageError::backend)?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(StorageError::backend)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.full_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::BlobNotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::backend(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.full_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::backend(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store
            .save("contracts/abc/file.bin", b"hello")
            .await
            .unwrap();
        assert_eq!(store.read("contracts/abc/file.bin").await.unwrap(), b"hello");

        store.delete("contracts/abc/file.bin").await.unwrap();
        assert!(matches!(
            store.read("contracts/abc/file.bin").await,
            Err(StorageError::BlobNotFound { .. })
        ));
        // Deleting again is a no-op.
        store.delete("contracts/abc/file.bin").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        for key in ["../escape", "a/../../b", "/etc/passwd/../x"] {
            assert!(
                matches!(store.save(key, b"x").await, Err(StorageError::Backend(_))),
                "{}",
                key
            );
        }
        // A leading slash alone is tolerated, the path stays inside.
        store.save("/rooted/ok.bin", b"x").await.unwrap();
        assert_eq!(store.read("rooted/ok.bin").await.unwrap(), b"x");
    }
}
