//! Payload spooling for installation package uploads.

use crate::error::{MirrorError, MirrorResult};
use crate::metrics;
use bytes::Bytes;
use depot_core::{ContentHash, ContentHasher};
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Chunk size used when reading a spooled package back.
pub const SPOOL_CHUNK_SIZE: usize = 64 * 1024;

/// A fully received package held in an anonymous temp file.
///
/// The file is unlinked from creation, so dropping the handle releases it.
#[derive(Debug)]
pub struct SpooledPackage {
    file: File,
    size: u64,
    digest: ContentHash,
}

impl SpooledPackage {
    pub fn size(&self) -> u64 {
        self.size
    }

    /// SHA-256 of the spooled bytes.
    pub fn digest(&self) -> &ContentHash {
        &self.digest
    }

    /// Consume into a file positioned at the start of the payload.
    pub fn into_file(self) -> File {
        self.file
    }
}

/// Drain `stream` into a temp file, hashing as it goes.
///
/// Fails with an invalid error once more than `max_size` bytes arrive or if the
/// stream itself errors.
pub async fn spool<S>(stream: S, max_size: u64) -> MirrorResult<SpooledPackage>
where
    S: Stream<Item = std::io::Result<Bytes>> + Send,
{
    let std_file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| MirrorError::Internal(format!("spool task failed: {e}")))?
        .map_err(|e| MirrorError::Internal(format!("failed to create spool file: {e}")))?;
    let mut file = File::from_std(std_file);

    let mut stream = std::pin::pin!(stream);
    let mut hasher: ContentHasher = ContentHash::hasher();
    let mut size: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| MirrorError::Invalid(format!("failed to read package payload: {e}")))?;

        size += chunk.len() as u64;
        if size > max_size {
            metrics::PACKAGES_REJECTED.with_label_values(&["too_large"]).inc();
            return Err(MirrorError::Invalid(format!(
                "package exceeds the maximum size of {max_size} bytes"
            )));
        }

        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .map_err(|e| MirrorError::Internal(format!("failed to spool package: {e}")))?;
    }

    file.flush()
        .await
        .map_err(|e| MirrorError::Internal(format!("failed to spool package: {e}")))?;
    file.rewind()
        .await
        .map_err(|e| MirrorError::Internal(format!("failed to rewind spool: {e}")))?;

    Ok(SpooledPackage {
        file,
        size,
        digest: hasher.finalize(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, std::io::Error>(Bytes::from_static(p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_spool_hashes_across_chunks() {
        let spooled = spool(chunks(&[b"package", b"-", b"data"]), 1024).await.unwrap();
        assert_eq!(spooled.size(), 12);
        assert_eq!(
            spooled.digest().to_hex(),
            "5f0ba01fa9b567c766a6f60c1ea51c691cbf04fa4939a118e6cde5c475319311"
        );

        let mut contents = Vec::new();
        spooled.into_file().read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"package-data");
    }

    #[tokio::test]
    async fn test_spool_enforces_max_size() {
        let err = spool(chunks(&[b"0123456789", b"0"]), 10).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Invalid);

        // Exactly at the limit is fine.
        assert!(spool(chunks(&[b"0123456789"]), 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_stream_error_is_invalid() {
        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let err = spool(failing, 1024).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_empty_payload() {
        let spooled = spool(chunks(&[]), 10).await.unwrap();
        assert_eq!(spooled.size(), 0);
        assert_eq!(spooled.digest(), &ContentHash::compute(b""));
    }
}
