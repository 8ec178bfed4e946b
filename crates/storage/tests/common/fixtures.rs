use bytes::Bytes;
use depot_storage::FilesystemBackend;
use tempfile::TempDir;

/// Deterministic pseudo-random bytes; the same seed gives the same output.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;
    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
    Bytes::from(data)
}

/// A filesystem backend rooted in a temp directory removed on drop.
pub struct TestStorage {
    pub backend: FilesystemBackend,
    pub dir: TempDir,
}

impl TestStorage {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(
            dir.path(),
            "http://127.0.0.1:8080/packages",
            Some("test-signing-key".to_string()),
        )
        .await
        .expect("Failed to create filesystem backend");
        Self { backend, dir }
    }
}
