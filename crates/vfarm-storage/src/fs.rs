//! Filesystem object store binding.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Object store rooted at a local directory; each bucket is a subdirectory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root taken from `FILE_SYSTEM_STORAGE_ROOT`, defaulting to `./data`.
    pub fn from_env() -> Self {
        Self::new(std::env::var("FILE_SYSTEM_STORAGE_ROOT").unwrap_or_else(|_| "./data".to_string()))
    }

    fn object_path(&self, bucket: &str, object: &str) -> StorageResult<PathBuf> {
        for part in [bucket, object] {
            if part.is_empty() || part.contains("..") || part.contains('/') || part.contains('\\') {
                return Err(StorageError::InvalidKey(format!("{bucket}/{object}")));
            }
        }
        Ok(self.root.join(bucket).join(object))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        _content_type: &str,
    ) -> StorageResult<()> {
        let dest = self.object_path(bucket, object)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &dest).await?;
        debug!(bucket, object, "stored object");
        Ok(())
    }

    async fn download(&self, bucket: &str, object: &str, dest: &Path) -> StorageResult<()> {
        let src = self.object_path(bucket, object)?;
        if !tokio::fs::try_exists(&src).await? {
            return Err(StorageError::not_found(format!("{bucket}/{object}")));
        }
        tokio::fs::copy(&src, dest).await?;
        Ok(())
    }

    async fn list(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let dir = self.root.join(bucket);
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                objects.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        objects.sort();
        Ok(objects)
    }

    async fn exists(&self, bucket: &str, object: &str) -> StorageResult<bool> {
        let path = self.object_path(bucket, object)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn upload_download_roundtrip() {
        let (dir, store) = store().await;

        let src = dir.path().join("src.mp4");
        tokio::fs::write(&src, b"fake video").await.unwrap();
        store
            .upload("input-videos", "a.mp4", &src, "video/mp4")
            .await
            .unwrap();

        assert!(store.exists("input-videos", "a.mp4").await.unwrap());
        assert_eq!(store.list("input-videos").await.unwrap(), vec!["a.mp4"]);

        let dest = dir.path().join("dest.mp4");
        store
            .download("input-videos", "a.mp4", &dest)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"fake video");
    }

    #[tokio::test]
    async fn missing_object_fails_with_not_found() {
        let (_dir, store) = store().await;
        let err = store
            .download("input-videos", "missing.mp4", Path::new("/tmp/never"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_bucket_lists_empty() {
        let (_dir, store) = store().await;
        assert!(store.list("nope").await.unwrap().is_empty());
        assert!(!store.exists("nope", "a.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let (_dir, store) = store().await;
        let err = store
            .exists("bucket", "../escape.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
