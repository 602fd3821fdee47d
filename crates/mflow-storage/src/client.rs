//! S3-compatible store implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::ArtifactStore;

/// Configuration for the S3-compatible client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint URL (S3-compatible services such as R2 or minio);
    /// empty for AWS S3 proper
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region ("auto" for R2)
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("MFLOW_S3_ENDPOINT_URL").ok(),
            access_key_id: std::env::var("MFLOW_S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config("MFLOW_S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("MFLOW_S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config("MFLOW_S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("MFLOW_S3_BUCKET")
                .map_err(|_| StorageError::config("MFLOW_S3_BUCKET not set"))?,
            region: std::env::var("MFLOW_S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Object storage client for S3-compatible services.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
}

impl S3ArtifactStore {
    /// Create a new client from configuration.
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "mflow",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true);

        if let Some(ref endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        Self {
            client,
            bucket: config.bucket_name,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(S3Config::from_env()?))
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::transient(format!("connectivity check failed: {}", e)))?;
        Ok(())
    }
}

/// Classify an SDK error into the storage taxonomy.
///
/// Service errors carry an error code; anything without a recognizable
/// code (dispatch failures, timeouts, 5xx responses) is treated as
/// transient and eligible for retry by the caller.
fn classify<E, R>(key: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err.code() {
        Some("NoSuchKey") | Some("NotFound") | Some("NoSuchBucket") => {
            StorageError::not_found(key)
        }
        Some("AccessDenied") | Some("Forbidden") | Some("InvalidAccessKeyId")
        | Some("SignatureDoesNotMatch") => StorageError::access_denied(err.to_string()),
        _ => StorageError::transient(err.to_string()),
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn fetch(&self, key: &str, dest: &Path) -> StorageResult<()> {
        debug!("Fetching {} to {}", key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(key, e))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::transient(e.to_string()))?
            .into_bytes();

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;

        info!("Fetched {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn store(&self, src: &Path, key: &str) -> StorageResult<String> {
        debug!("Storing {} as {}", src.display(), key);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| classify(key, e))?;

        info!("Stored {} as {}", src.display(), key);
        Ok(key.to_string())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            // Head responses carry no error body, so check the typed
            // variant before falling back to code classification
            Err(SdkError::ServiceError(se)) if se.err().is_not_found() => Ok(false),
            Err(e) => match classify(key, e) {
                StorageError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(key, e))?;

        Ok(())
    }
}
