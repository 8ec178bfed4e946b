//! Package objects in the content store.

use crate::error::{MirrorError, MirrorResult};
use crate::upload::{SPOOL_CHUNK_SIZE, SpooledPackage};
use depot_storage::{ObjectStore, StorageError};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Key prefix for package objects.
pub const PACKAGE_KEY_PREFIX: &str = "provider-mirror/platforms";

/// Object key of the package admitted as `platform_mirror_id`.
pub fn package_key(platform_mirror_id: Uuid) -> String {
    format!("{PACKAGE_KEY_PREFIX}/{platform_mirror_id}/package.zip")
}

/// Content store keyed by platform mirror ID.
#[derive(Clone)]
pub struct PackageStore {
    store: Arc<dyn ObjectStore>,
}

impl PackageStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Stream a spooled package into the store under `platform_mirror_id`.
    ///
    /// The object only becomes visible if every byte was written.
    #[tracing::instrument(skip(self, package), fields(size = package.size()))]
    pub async fn upload(&self, platform_mirror_id: Uuid, package: SpooledPackage) -> MirrorResult<()> {
        let key = package_key(platform_mirror_id);
        let expected = package.size();
        let mut upload = self.store.put_stream(&key).await?;
        let mut reader = ReaderStream::with_capacity(package.into_file(), SPOOL_CHUNK_SIZE);

        while let Some(chunk) = reader.next().await {
            let written = match chunk {
                Ok(chunk) => upload.write(chunk).await,
                Err(e) => Err(StorageError::Io(e)),
            };
            if let Err(e) = written {
                if let Err(abort_err) = upload.abort().await {
                    tracing::warn!(key = %key, error = %abort_err, "failed to abort package upload");
                }
                return Err(e.into());
            }
        }

        let written = upload.finish().await?;
        if written != expected {
            // Already visible under the key, so it has to go.
            if let Err(e) = self.store.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "failed to delete short package object");
            }
            return Err(MirrorError::Internal(format!(
                "stored {written} bytes for {key}, expected {expected}"
            )));
        }
        Ok(())
    }

    /// Time-limited download URL for an admitted package.
    pub async fn presigned_url(
        &self,
        platform_mirror_id: Uuid,
        expires_in: Duration,
    ) -> MirrorResult<String> {
        Ok(self
            .store
            .presigned_url(&package_key(platform_mirror_id), expires_in)
            .await?)
    }

    /// Remove a stored package. A package that is already gone is not an error.
    pub async fn delete(&self, platform_mirror_id: Uuid) -> MirrorResult<()> {
        match self.store.delete(&package_key(platform_mirror_id)).await {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
