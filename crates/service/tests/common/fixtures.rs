//! Service harness and upstream fixtures.

use super::caller::TestCaller;
use super::registry::{Release, StaticRegistry};
use super::storage::{FailingStore, SlowStore};
use bytes::Bytes;
use depot_core::config::MirrorConfig;
use depot_core::{ContentHash, PackageName, Platform, Provider, SemanticVersion};
use depot_metadata::models::{GroupRow, ResourceLimitKind};
use depot_metadata::{
    MetadataStore, Pagination, PlatformMirrorFilter, Sort, SqliteStore, VersionMirrorFilter,
};
use depot_service::{
    CreateVersionMirrorInput, MirrorResult, MirrorService, ProviderQuery, VersionMirror,
};
use depot_signer::{OpenPgpVerifier, SignatureVerifier, SignerError, SignerResult, TrustVerifier};
use depot_storage::{FilesystemBackend, ObjectStore};
use futures::Stream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

pub const HOSTNAME: &str = "registry.terraform.io";
pub const NAMESPACE: &str = "hashicorp";

/// Payload whose digest the upstream manifests record for `linux_amd64`.
pub const LINUX_PAYLOAD: &[u8] = b"package-data";
pub const LINUX_DIGEST: &str = "5f0ba01fa9b567c766a6f60c1ea51c691cbf04fa4939a118e6cde5c475319311";
pub const DARWIN_PAYLOAD: &[u8] = b"darwin-package-data";

/// Key the stub verifier accepts.
pub const STUB_KEY: &str = "stub-signing-key";

pub const OPENPGP_MANIFEST: &[u8] = include_bytes!("../../../signer/tests/fixtures/SHA256SUMS");
pub const OPENPGP_SIGNATURE: &[u8] =
    include_bytes!("../../../signer/tests/fixtures/SHA256SUMS.sig");
pub const OPENPGP_SIGNER_KEY: &str = include_str!("../../../signer/tests/fixtures/signer.asc");
pub const OPENPGP_OTHER_KEY: &str = include_str!("../../../signer/tests/fixtures/other.asc");

/// Accepts a signature iff its bytes equal the key text.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubVerifier;

impl SignatureVerifier for StubVerifier {
    fn verify_detached(
        &self,
        _message: &[u8],
        signature: &[u8],
        armored_key: &str,
    ) -> SignerResult<()> {
        if signature == armored_key.as_bytes() {
            Ok(())
        } else {
            Err(SignerError::VerificationFailed)
        }
    }
}

/// Build a checksum manifest for `provider_type`/`version` over `(os, arch, payload)`.
#[allow(dead_code)]
pub fn manifest_for(provider_type: &str, version: &str, packages: &[(&str, &str, &[u8])]) -> Bytes {
    let version = SemanticVersion::parse(version).expect("valid version");
    let mut text = String::new();
    for (os, arch, payload) in packages {
        let platform = Platform::new(os, arch).expect("valid platform");
        let name = PackageName::new(provider_type, &version, &platform);
        text.push_str(&format!("{}  {name}\n", ContentHash::compute(payload).to_hex()));
    }
    Bytes::from(text)
}

/// Split a payload into small chunks so uploads stream.
#[allow(dead_code)]
pub fn payload(data: &'static [u8]) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    futures::stream::iter(
        data.chunks(4)
            .map(|chunk| Ok::<_, std::io::Error>(Bytes::from_static(chunk)))
            .collect::<Vec<_>>(),
    )
}

#[allow(dead_code)]
pub fn provider(provider_type: &str) -> Provider {
    Provider::parse(HOSTNAME, NAMESPACE, provider_type).expect("valid provider")
}

#[allow(dead_code)]
pub fn create_input(group_path: &str, provider_type: &str, version: &str) -> CreateVersionMirrorInput {
    CreateVersionMirrorInput {
        group_path: group_path.to_string(),
        registry_hostname: HOSTNAME.to_string(),
        registry_namespace: NAMESPACE.to_string(),
        provider_type: provider_type.to_string(),
        semantic_version: version.to_string(),
    }
}

#[allow(dead_code)]
pub fn provider_query(group_path: &str, provider_type: &str) -> ProviderQuery {
    ProviderQuery {
        group_path: group_path.to_string(),
        registry_hostname: HOSTNAME.to_string(),
        registry_namespace: NAMESPACE.to_string(),
        provider_type: provider_type.to_string(),
    }
}

/// A mirror service over SQLite and filesystem storage in a temp directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestMirror<V = StubVerifier> {
    pub service: MirrorService<V>,
    pub metadata: Arc<dyn MetadataStore>,
    pub storage: Arc<FilesystemBackend>,
    pub registry: Arc<StaticRegistry>,
    pub admin: TestCaller,
    storage_root: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestMirror<StubVerifier> {
    pub async fn new() -> Self {
        Self::with_config(MirrorConfig::default()).await
    }

    pub async fn with_config(config: MirrorConfig) -> Self {
        Self::build(TrustVerifier::new(StubVerifier), config, |store| store).await
    }

    /// A harness whose content store fails every upload.
    pub async fn with_failing_store() -> (Self, Arc<FailingStore>) {
        let mut failing = None;
        let mirror = Self::build(TrustVerifier::new(StubVerifier), MirrorConfig::default(), |store| {
            let store = Arc::new(FailingStore::new(store));
            failing = Some(store.clone());
            store as Arc<dyn ObjectStore>
        })
        .await;
        (mirror, failing.expect("store wrapped"))
    }

    /// A harness whose content store delays every streamed chunk.
    pub async fn with_slow_store(write_delay: Duration) -> Self {
        Self::build(TrustVerifier::new(StubVerifier), MirrorConfig::default(), |store| {
            Arc::new(SlowStore::new(store, write_delay)) as Arc<dyn ObjectStore>
        })
        .await
    }
}

#[allow(dead_code)]
impl TestMirror<OpenPgpVerifier> {
    pub async fn openpgp() -> Self {
        Self::build(TrustVerifier::openpgp(), MirrorConfig::default(), |store| store).await
    }
}

#[allow(dead_code)]
impl<V: SignatureVerifier> TestMirror<V> {
    async fn build<F>(trust: TrustVerifier<V>, config: MirrorConfig, wrap_store: F) -> Self
    where
        F: FnOnce(Arc<dyn ObjectStore>) -> Arc<dyn ObjectStore>,
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_root = temp_dir.path().join("storage");
        let storage = Arc::new(
            FilesystemBackend::new(
                &storage_root,
                "http://127.0.0.1:8080/packages",
                Some("test-signing-key".to_string()),
            )
            .await
            .expect("Failed to create storage backend"),
        );

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"), Duration::from_secs(5))
                .await
                .expect("Failed to create metadata store"),
        );

        let registry = Arc::new(StaticRegistry::new());
        let store = wrap_store(storage.clone() as Arc<dyn ObjectStore>);
        let service = MirrorService::with_trust_verifier(
            metadata.clone(),
            store,
            registry.clone(),
            trust,
            config,
        );

        Self {
            service,
            metadata,
            storage,
            registry,
            admin: TestCaller::admin("admin@example.com"),
            storage_root,
            _temp_dir: temp_dir,
        }
    }

    /// Create a group. A `/` in the path makes it a child of the existing parent path.
    pub async fn group(&self, full_path: &str) -> GroupRow {
        let parent_id = match full_path.rsplit_once('/') {
            Some((parent, _)) => Some(
                self.metadata
                    .get_group_by_path(parent)
                    .await
                    .expect("lookup parent")
                    .expect("parent exists")
                    .group_id,
            ),
            None => None,
        };
        let row = GroupRow {
            group_id: Uuid::new_v4(),
            parent_id,
            name: full_path.rsplit('/').next().unwrap_or(full_path).to_string(),
            full_path: full_path.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.metadata.create_group(&row).await.expect("create group");
        row
    }

    /// Publish `version` upstream with linux_amd64 and darwin_arm64 packages,
    /// signed so the stub verifier accepts it.
    pub fn publish(&self, provider_type: &str, version: &str) {
        self.registry.publish(
            &provider(provider_type),
            Release {
                version,
                platforms: &[("linux", "amd64"), ("darwin", "arm64")],
                manifest: manifest_for(
                    provider_type,
                    version,
                    &[("linux", "amd64", LINUX_PAYLOAD), ("darwin", "arm64", DARWIN_PAYLOAD)],
                ),
                signature: Bytes::from_static(STUB_KEY.as_bytes()),
                armored_keys: vec!["retired-key".to_string(), STUB_KEY.to_string()],
            },
        );
    }

    /// Publish and mirror a version into `group_path` as the admin.
    pub async fn mirror(&self, group_path: &str, provider_type: &str, version: &str) -> VersionMirror {
        self.publish(provider_type, version);
        self.service
            .create_version_mirror(&self.admin, create_input(group_path, provider_type, version))
            .await
            .expect("create version mirror")
    }

    pub async fn set_group_limit(&self, group_id: Option<Uuid>, value: i64) {
        self.metadata
            .set_resource_limit(
                ResourceLimitKind::TerraformProviderVersionMirrorsPerGroup,
                group_id,
                value,
            )
            .await
            .expect("set resource limit");
    }

    pub async fn version_mirror_count(&self, group_id: Uuid) -> u64 {
        let filter = VersionMirrorFilter {
            group_id: Some(group_id),
            ..Default::default()
        };
        self.metadata
            .list_version_mirrors(&filter, Sort::default(), Pagination::count_only())
            .await
            .expect("count version mirrors")
            .total_count
    }

    pub async fn platform_mirror_count(&self, version_mirror_id: Uuid) -> u64 {
        let filter = PlatformMirrorFilter {
            version_mirror_id: Some(version_mirror_id),
            ..Default::default()
        };
        self.metadata
            .list_platform_mirrors(&filter, Sort::default(), Pagination::count_only())
            .await
            .expect("count platform mirrors")
            .total_count
    }

    /// Whether any package object was ever written to the store.
    pub fn has_stored_packages(&self) -> bool {
        let dir = self.storage_root.join(depot_service::packages::PACKAGE_KEY_PREFIX);
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Number of package objects currently in the store.
    pub fn stored_package_count(&self) -> usize {
        let dir = self.storage_root.join(depot_service::packages::PACKAGE_KEY_PREFIX);
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().join("package.zip").is_file())
            .count()
    }

    /// Admin upload of a payload.
    pub async fn upload(
        &self,
        version_mirror_id: Uuid,
        os: &str,
        arch: &str,
        data: &'static [u8],
    ) -> MirrorResult<depot_service::PlatformMirror> {
        self.service
            .upload_installation_package(&self.admin, version_mirror_id, os, arch, payload(data))
            .await
    }
}
