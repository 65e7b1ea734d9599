//! S3-compatible object store binding.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Configuration for the S3-compatible binding.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Host:port of the blob service
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Region label; most self-hosted services accept anything
    pub region: String,
    pub use_ssl: bool,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint: std::env::var("OBJECT_STORE_ENDPOINT")
                .unwrap_or_else(|_| "localhost:9000".to_string()),
            access_key: std::env::var("OBJECT_STORE_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("OBJECT_STORE_ACCESS_KEY not set"))?,
            secret_key: std::env::var("OBJECT_STORE_SECRET_KEY")
                .map_err(|_| StorageError::config_error("OBJECT_STORE_SECRET_KEY not set"))?,
            region: std::env::var("OBJECT_STORE_REGION").unwrap_or_else(|_| "auto".to_string()),
            use_ssl: std::env::var("OBJECT_STORE_SSL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }

    fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint)
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials =
            Credentials::new(&config.access_key, &config.secret_key, None, None, "vfarm");

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    /// Create the bucket if it does not exist yet.
    pub async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        let result = self.client.create_bucket().bucket(bucket).send().await;
        match result {
            Ok(_) => {
                debug!(bucket, "created bucket");
                Ok(())
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you()
                    || service_err.is_bucket_already_exists()
                {
                    Ok(())
                } else {
                    Err(StorageError::config_error(service_err.to_string()))
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!(bucket, object, path = %path.display(), "uploading");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(object)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }

    async fn download(&self, bucket: &str, object: &str, dest: &Path) -> StorageResult<()> {
        debug!(bucket, object, dest = %dest.display(), "downloading");

        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::not_found(format!("{bucket}/{object}"))
                } else {
                    StorageError::download_failed(service_err.to_string())
                }
            })?;

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes();

        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn list(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::ListFailed(e.to_string()))?;

        Ok(resp
            .contents()
            .iter()
            .filter_map(|o| o.key().map(str::to_string))
            .collect())
    }

    async fn exists(&self, bucket: &str, object: &str) -> StorageResult<bool> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::ListFailed(service_err.to_string()))
                }
            }
        }
    }
}
