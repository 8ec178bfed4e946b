//! Local filesystem storage backend.
//!
//! Packages are expected to be served from `public_base_url` by a static file
//! server in front of the storage root. Download URLs carry an expiry and an
//! HMAC-SHA256 signature that the fronting server checks with
//! [`FilesystemBackend::verify_presigned`].

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl std::fmt::Debug for FilesystemBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemBackend")
            .field("root", &self.root)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    ///
    /// Without a signing key an ephemeral one is generated, so URLs issued
    /// before a restart stop verifying after it.
    pub async fn new(
        root: impl AsRef<Path>,
        public_base_url: impl Into<String>,
        signing_key: Option<String>,
    ) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        let signing_key = match signing_key {
            Some(key) if key.is_empty() => {
                return Err(StorageError::Config(
                    "filesystem url_signing_key must not be empty".to_string(),
                ));
            }
            Some(key) => key.into_bytes(),
            None => {
                tracing::warn!(
                    root = %root.display(),
                    "no url_signing_key configured; using an ephemeral key for download URLs"
                );
                [Uuid::new_v4().into_bytes(), Uuid::new_v4().into_bytes()].concat()
            }
        };

        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signing_key,
        })
    }

    /// Resolve a key below the root, rejecting traversal.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;

        let path = root.join(key);
        let root_canonical = root.canonicalize()?;

        // The deepest existing ancestor (or the path itself) must resolve
        // inside the root, so symlinks cannot redirect reads or writes.
        let mut probe = Some(path.as_path());
        while let Some(candidate) = probe {
            match std::fs::symlink_metadata(candidate) {
                Ok(_) => {
                    let resolved = candidate.canonicalize().map_err(|_| {
                        StorageError::InvalidKey(format!("unresolvable path component: {key}"))
                    })?;
                    if !resolved.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    probe = candidate.parent();
                }
                Err(err) => return Err(StorageError::Io(err)),
            }
        }

        Ok(path)
    }

    fn sign(&self, key: &str, expires: i64) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| StorageError::Config(format!("invalid url signing key: {e}")))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Check a download URL's `expires` and `signature` query values for `key`.
    pub fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> StorageResult<()> {
        if OffsetDateTime::now_utc().unix_timestamp() > expires {
            return Err(StorageError::PresignRejected(format!(
                "URL for {key} expired"
            )));
        }
        let provided = hex::decode(signature)
            .map_err(|_| StorageError::PresignRejected("signature is not hex".to_string()))?;
        self.sign(key, expires)?
            .verify_slice(&provided)
            .map_err(|_| StorageError::PresignRejected(format!("bad signature for {key}")))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        )
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
        return Err(StorageError::InvalidKey(format!("invalid key: {key:?}")));
    }
    if !Path::new(key)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        || key.contains("..")
    {
        return Err(StorageError::InvalidKey(format!(
            "path traversal not allowed: {key}"
        )));
    }
    Ok(())
}

fn not_found_or_io(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key).await?;
        let data = fs::read(&path).await.map_err(not_found_or_io(key))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let mut upload = self.put_stream(key).await?;
        if let Err(e) = upload.write(data).await {
            let _ = upload.abort().await;
            return Err(e);
        }
        upload.finish().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let path = self.key_path(key).await?;
        self.ensure_parent(&path).await?;

        let temp_path = Self::temp_path_for(&path);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUpload {
            file,
            temp_path,
            final_path: path,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key).await?;
        fs::remove_file(&path).await.map_err(not_found_or_io(key))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        validate_key(key)?;
        let expires_in = time::Duration::try_from(expires_in)
            .map_err(|e| StorageError::Config(format!("invalid URL lifetime: {e}")))?;
        let expires = (OffsetDateTime::now_utc() + expires_in).unix_timestamp();
        let signature = hex::encode(self.sign(key, expires)?.finalize().into_bytes());

        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.public_base_url, key, expires, signature
        ))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Streaming upload written to a sibling temp file and renamed into place.
struct FilesystemUpload {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        self.file.sync_all().await?;
        drop(self.file);
        fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}
