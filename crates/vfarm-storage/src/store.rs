//! Object-store capability.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Blob namespace shared between workers: buckets of named objects.
///
/// Transfers are file-based; workers stage media in a scratch directory
/// between download, transcode and upload.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` as `bucket/object`.
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Download `bucket/object` into the file at `dest`.
    async fn download(&self, bucket: &str, object: &str, dest: &Path) -> StorageResult<()>;

    /// Object names in a bucket. A missing bucket lists as empty.
    async fn list(&self, bucket: &str) -> StorageResult<Vec<String>>;

    /// Whether `bucket/object` exists.
    async fn exists(&self, bucket: &str, object: &str) -> StorageResult<bool>;
}
