//! S3-compatible storage backend using AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, StreamingUpload};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::future::ProvideCredentials as ProvideCredentialsFuture;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::instrument;

/// Minimum part size for S3 multipart uploads (5 MiB).
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Marker included in lazy-credentials errors so they map to a config error.
const CREDENTIALS_ERROR_MARKER: &str = "depot-s3-lazy-credentials";

/// Lazily initializes the AWS default credentials chain on first signed request.
///
/// Building the chain eagerly touches TLS roots, which are not always present
/// where the mirror runs against a plain-HTTP MinIO.
#[derive(Debug)]
struct LazyDefaultCredentialsProvider {
    region: String,
    chain: OnceCell<aws_config::default_provider::credentials::DefaultCredentialsChain>,
}

impl LazyDefaultCredentialsProvider {
    fn new(region: String) -> Self {
        Self {
            region,
            chain: OnceCell::new(),
        }
    }

    async fn credentials(&self) -> aws_credential_types::provider::Result {
        let chain = self
            .chain
            .get_or_init(|| async {
                aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                    .region(aws_config::Region::new(self.region.clone()))
                    .build()
                    .await
            })
            .await;
        chain.provide_credentials().await.map_err(|err| {
            CredentialsError::provider_error(format!(
                "{CREDENTIALS_ERROR_MARKER}: default AWS credentials resolution failed: {err}"
            ))
        })
    }
}

impl ProvideCredentials for LazyDefaultCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFuture<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFuture::new(self.credentials())
    }
}

fn map_s3_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if err.to_string().contains(CREDENTIALS_ERROR_MARKER) {
        return StorageError::Config(
            "S3 credential resolution failed. Configure access_key_id/secret_access_key or ambient AWS credentials."
                .to_string(),
        );
    }
    StorageError::S3(Box::new(err))
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() == 404)
}

/// S3-compatible object store using AWS SDK.
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    endpoint: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend.
    ///
    /// `force_path_style` selects `endpoint/bucket/key` URLs, which MinIO and
    /// some S3-compatible services require.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        let region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .force_path_style(force_path_style);

        builder = match (access_key_id, secret_access_key) {
            (Some(key_id), Some(secret)) => builder.credentials_provider(
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "depot-config"),
            ),
            (None, None) => {
                builder.credentials_provider(LazyDefaultCredentialsProvider::new(region.clone()))
            }
            _ => {
                return Err(StorageError::Config(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ));
            }
        };

        // Bare host:port endpoints (e.g. "minio:9000") are plain HTTP.
        let endpoint = endpoint.map(|url| {
            let lower = url.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                url
            } else {
                format!("http://{url}")
            }
        });
        if let Some(url) = &endpoint {
            builder = builder.endpoint_url(url);
            if url.to_ascii_lowercase().starts_with("http://") {
                builder = builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            prefix,
            endpoint: endpoint.unwrap_or_else(|| format!("s3.{region}.amazonaws.com")),
        })
    }

    /// Object key in the bucket, with the configured prefix applied.
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(map_s3_error(err)),
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    StorageError::NotFound(key.to_string())
                } else {
                    map_s3_error(err)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();
        Ok(bytes)
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(data.into())
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let full_key = self.full_key(key);
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(map_s3_error)?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| StorageError::Config("S3 did not return upload_id".to_string()))?
            .to_string();

        Ok(Box::new(S3Upload {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key: full_key,
            upload_id,
            parts: Vec::new(),
            buffer: Vec::with_capacity(MIN_PART_SIZE),
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        // delete_object succeeds on missing keys; report them like the filesystem does.
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Config(format!("invalid URL lifetime: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .presigned(config)
            .await
            .map_err(map_s3_error)?;
        Ok(request.uri().to_string())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

        let check = self.client.head_bucket().bucket(&self.bucket).send();
        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check)
            .await
            .map_err(|_| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out after 10 seconds",
                ))
            })?
            .map_err(map_s3_error)?;
        Ok(())
    }
}

/// Multipart upload that sends a part whenever 5 MiB has accumulated.
struct S3Upload {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
    parts: Vec<aws_sdk_s3::types::CompletedPart>,
    buffer: Vec<u8>,
    bytes_written: u64,
}

impl S3Upload {
    async fn upload_part(&mut self, data: Bytes) -> StorageResult<()> {
        let part_number = i32::try_from(self.parts.len() + 1)
            .map_err(|_| StorageError::Config("too many multipart parts".to_string()))?;
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .part_number(part_number)
            .body(data.into())
            .send()
            .await
            .map_err(map_s3_error)?;

        self.parts.push(
            aws_sdk_s3::types::CompletedPart::builder()
                .e_tag(output.e_tag().unwrap_or_default())
                .part_number(part_number)
                .build(),
        );
        Ok(())
    }

    async fn abort_multipart(&self) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .send()
            .await
            .map_err(map_s3_error)?;
        Ok(())
    }
}

#[async_trait]
impl StreamingUpload for S3Upload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.bytes_written += data.len() as u64;
        self.buffer.extend_from_slice(&data);

        while self.buffer.len() >= MIN_PART_SIZE {
            let part: Vec<u8> = self.buffer.drain(..MIN_PART_SIZE).collect();
            self.upload_part(Bytes::from(part)).await?;
        }
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        if !self.buffer.is_empty() {
            let last = Bytes::from(std::mem::take(&mut self.buffer));
            self.upload_part(last).await?;
        }

        // Multipart uploads need at least one non-empty part.
        if self.parts.is_empty() {
            if let Err(e) = self.abort_multipart().await {
                tracing::warn!(key = %self.key, error = %e, "failed to abort empty multipart upload");
            }
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&self.key)
                .body(Bytes::new().into())
                .send()
                .await
                .map_err(map_s3_error)?;
            return Ok(0);
        }

        let completed = aws_sdk_s3::types::CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.parts)))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(map_s3_error)?;

        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.abort_multipart().await
    }
}
