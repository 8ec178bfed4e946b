//! Content store test doubles.

use async_trait::async_trait;
use bytes::Bytes;
use depot_storage::{ObjectStore, StorageError, StorageResult, StreamingUpload};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Delegates to an inner store, but every streaming upload fails on write.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct FailingStore {
    inner: Arc<dyn ObjectStore>,
    aborted: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            aborted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of uploads that were aborted after failing.
    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }
}

struct FailingUpload {
    aborted: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamingUpload for FailingUpload {
    async fn write(&mut self, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.aborted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, _key: &str, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other("disk full")))
    }

    async fn put_stream(&self, _key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        Ok(Box::new(FailingUpload {
            aborted: self.aborted.clone(),
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.inner.presigned_url(key, expires_in).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Delegates to an inner store, but every streamed chunk is delayed.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct SlowStore {
    inner: Arc<dyn ObjectStore>,
    write_delay: Duration,
}

#[allow(dead_code)]
impl SlowStore {
    pub fn new(inner: Arc<dyn ObjectStore>, write_delay: Duration) -> Self {
        Self { inner, write_delay }
    }
}

struct SlowUpload {
    inner: Box<dyn StreamingUpload>,
    write_delay: Duration,
}

#[async_trait]
impl StreamingUpload for SlowUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.write(data).await
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        self.inner.finish().await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.inner.abort().await
    }
}

#[async_trait]
impl ObjectStore for SlowStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        tokio::time::sleep(self.write_delay).await;
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        Ok(Box::new(SlowUpload {
            inner: self.inner.put_stream(key).await?,
            write_delay: self.write_delay,
        }))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.inner.presigned_url(key, expires_in).await
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}
