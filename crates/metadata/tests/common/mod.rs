//! Catalog test utilities.

use depot_metadata::models::{GroupRow, PlatformMirrorRow, VersionMirrorRow};
use depot_metadata::{MetadataStore, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A SQLite metadata store in a temp directory that is removed on drop.
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    _temp_dir: TempDir,
}

impl TestMetadata {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("test.db"), Duration::from_secs(5))
            .await
            .expect("Failed to open sqlite store");
        Self {
            store: Arc::new(store),
            _temp_dir: temp_dir,
        }
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }

    /// Create a group, returning its row.
    pub async fn group(&self, full_path: &str, parent_id: Option<Uuid>) -> GroupRow {
        let name = full_path.rsplit('/').next().unwrap_or(full_path).to_string();
        let row = GroupRow {
            group_id: Uuid::new_v4(),
            parent_id,
            name,
            full_path: full_path.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.store.create_group(&row).await.expect("create group");
        row
    }
}

pub fn version_mirror(group_id: Uuid, provider_type: &str, version: &str) -> VersionMirrorRow {
    let id = Uuid::new_v4();
    VersionMirrorRow {
        version_mirror_id: id,
        group_id,
        registry_hostname: "registry.terraform.io".to_string(),
        registry_namespace: "hashicorp".to_string(),
        provider_type: provider_type.to_string(),
        semantic_version: version.to_string(),
        digests: "{}".to_string(),
        created_by: "tester".to_string(),
        resource_path: format!("provider-mirror/versions/{id}"),
        created_at: OffsetDateTime::now_utc(),
    }
}

pub fn platform_mirror(version_mirror_id: Uuid, os: &str, arch: &str) -> PlatformMirrorRow {
    let id = Uuid::new_v4();
    PlatformMirrorRow {
        platform_mirror_id: id,
        version_mirror_id,
        os: os.to_string(),
        arch: arch.to_string(),
        resource_path: format!("provider-mirror/platforms/{id}"),
        created_at: OffsetDateTime::now_utc(),
    }
}
