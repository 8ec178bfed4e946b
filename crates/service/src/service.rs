//! Provider mirror orchestration.

use crate::auth::{Caller, Permission, Scope};
use crate::error::{MirrorError, MirrorResult};
use crate::metrics;
use crate::model::{
    CreateVersionMirrorInput, GetVersionMirrorsInput, InstallationPackage, PlatformMirror,
    ProviderQuery, VersionMirror,
};
use crate::packages::PackageStore;
use crate::quota::QuotaEnforcer;
use crate::registry::{RegistryError, RegistryProtocolClient};
use crate::upload;
use anyhow::Context;
use bytes::Bytes;
use depot_core::config::{AppConfig, MirrorConfig};
use depot_core::{DigestTable, PackageName, Platform, Provider, SemanticVersion};
use depot_metadata::models::{ActivityEventRow, GroupRow, PlatformMirrorRow, VersionMirrorRow};
use depot_metadata::{
    MetadataError, MetadataStore, MirrorTransaction, Page, Pagination, PlatformMirrorFilter, Sort,
    VersionMirrorFilter,
};
use depot_signer::{OpenPgpVerifier, SignatureVerifier, TrustVerifier};
use depot_storage::ObjectStore;
use futures::Stream;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

const VERSION_MIRROR_TARGET: &str = "terraform_provider_version_mirror";
const PLATFORM_MIRROR_TARGET: &str = "terraform_provider_platform_mirror";

fn version_resource_path(id: Uuid) -> String {
    format!("provider-mirror/versions/{id}")
}

fn platform_resource_path(id: Uuid) -> String {
    format!("provider-mirror/platforms/{id}")
}

/// Mirrors upstream provider versions into root groups and serves them back.
///
/// The service is stateless between calls. Multi-step writes run inside a
/// catalog transaction; while one is open the service makes no other catalog
/// calls, since the store may be backed by a single connection.
pub struct MirrorService<V = OpenPgpVerifier> {
    metadata: Arc<dyn MetadataStore>,
    packages: PackageStore,
    registry: Arc<dyn RegistryProtocolClient>,
    trust: TrustVerifier<V>,
    quota: QuotaEnforcer,
    config: MirrorConfig,
}

impl MirrorService<OpenPgpVerifier> {
    /// Create a service that verifies manifests with OpenPGP.
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<dyn RegistryProtocolClient>,
        config: MirrorConfig,
    ) -> Self {
        Self::with_trust_verifier(metadata, store, registry, TrustVerifier::openpgp(), config)
    }

    /// Open the configured stores and build a service over them.
    pub async fn from_config(
        config: &AppConfig,
        registry: Arc<dyn RegistryProtocolClient>,
    ) -> anyhow::Result<Self> {
        let metadata = depot_metadata::from_config(&config.metadata)
            .await
            .context("failed to open metadata store")?;
        let store = depot_storage::from_config(&config.storage)
            .await
            .context("failed to open content store")?;

        tracing::info!(
            storage_backend = store.backend_name(),
            "provider mirror service initialized"
        );
        Ok(Self::new(metadata, store, registry, config.mirror.clone()))
    }
}

impl<V: SignatureVerifier> MirrorService<V> {
    pub fn with_trust_verifier(
        metadata: Arc<dyn MetadataStore>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<dyn RegistryProtocolClient>,
        trust: TrustVerifier<V>,
        config: MirrorConfig,
    ) -> Self {
        metrics::register_metrics();
        Self {
            metadata,
            packages: PackageStore::new(store),
            registry,
            trust,
            quota: QuotaEnforcer::new(config.default_version_mirror_limit),
            config,
        }
    }

    // =========================================================================
    // Version mirrors
    // =========================================================================

    /// Mirror a provider version into a root group.
    ///
    /// Nothing is written until the upstream checksum manifest has been
    /// verified; the quota check and insert share one transaction.
    #[tracing::instrument(
        skip(self, caller, input),
        fields(
            group_path = %input.group_path,
            provider_type = %input.provider_type,
            version = %input.semantic_version
        )
    )]
    pub async fn create_version_mirror(
        &self,
        caller: &dyn Caller,
        input: CreateVersionMirrorInput,
    ) -> MirrorResult<VersionMirror> {
        self.authorize(
            caller,
            Permission::CreateProviderMirror,
            Scope::NamespacePath(input.group_path.clone()),
        )
        .await?;

        let group = self.resolve_group(&input.group_path).await?;
        if !group.is_root() {
            return Err(MirrorError::Invalid(format!(
                "provider version mirrors can only be created in a root group, {} is a subgroup",
                group.full_path
            )));
        }

        let provider = Provider::parse(
            &input.registry_hostname,
            &input.registry_namespace,
            &input.provider_type,
        )?;
        let version = SemanticVersion::parse(&input.semantic_version)?;

        let digests = self.fetch_verified_digests(&provider, &version).await?;

        let id = Uuid::new_v4();
        let mirror = VersionMirror {
            id,
            group_id: group.group_id,
            provider,
            version,
            digests,
            created_by: caller.subject().to_string(),
            resource_path: version_resource_path(id),
            created_at: OffsetDateTime::now_utc(),
        };
        let row = VersionMirrorRow {
            version_mirror_id: mirror.id,
            group_id: mirror.group_id,
            registry_hostname: mirror.provider.hostname.clone(),
            registry_namespace: mirror.provider.namespace.clone(),
            provider_type: mirror.provider.provider_type.clone(),
            semantic_version: mirror.version.to_string(),
            digests: mirror
                .digests
                .to_json()
                .map_err(|e| MirrorError::Internal(format!("failed to encode digest table: {e}")))?,
            created_by: mirror.created_by.clone(),
            resource_path: mirror.resource_path.clone(),
            created_at: mirror.created_at,
        };
        let event = activity_event(
            &group,
            caller,
            "create",
            VERSION_MIRROR_TARGET,
            id,
            serde_json::json!({
                "provider": mirror.provider.to_string(),
                "version": mirror.version.to_string(),
            }),
        );

        let mut tx = self.metadata.begin().await?;
        let inserted = self
            .insert_version_mirror(tx.as_mut(), &mirror, &row, &event)
            .await;
        if let Err(e) = inserted {
            return Err(abandon(tx, e).await);
        }
        tx.commit().await?;

        metrics::VERSION_MIRRORS_CREATED.inc();
        tracing::info!(
            version_mirror_id = %id,
            group_id = %group.group_id,
            provider = %mirror.provider,
            version = %mirror.version,
            packages = mirror.digests.len(),
            "provider version mirror created"
        );
        Ok(mirror)
    }

    async fn insert_version_mirror(
        &self,
        tx: &mut dyn MirrorTransaction,
        mirror: &VersionMirror,
        row: &VersionMirrorRow,
        event: &ActivityEventRow,
    ) -> MirrorResult<()> {
        self.quota
            .check_version_mirror_quota(tx, row.group_id)
            .await?;
        tx.insert_version_mirror(row).await.map_err(|e| match e {
            MetadataError::AlreadyExists(_) => MirrorError::Conflict(format!(
                "version {} of provider {} is already mirrored in this group",
                mirror.version, mirror.provider
            )),
            other => other.into(),
        })?;
        tx.insert_activity_event(event).await?;
        Ok(())
    }

    /// Resolve the upstream checksum manifest for a version and verify its signature.
    async fn fetch_verified_digests(
        &self,
        provider: &Provider,
        version: &SemanticVersion,
    ) -> MirrorResult<DigestTable> {
        let service_url = self
            .upstream(
                "discover registry service",
                self.registry.discover_service_url(&provider.hostname),
            )
            .await?;

        let versions = self
            .upstream(
                "list upstream versions",
                self.registry.list_versions(provider, &service_url),
            )
            .await?;

        // Registries do not always report versions in canonical form.
        let platform = versions
            .into_iter()
            .find(|offered| {
                SemanticVersion::parse(&offered.version).is_ok_and(|parsed| &parsed == version)
            })
            .and_then(|offered| offered.platforms.into_iter().next())
            .ok_or_else(|| {
                MirrorError::Invalid(format!(
                    "version {version} of provider {provider} is not offered upstream"
                ))
            })?;

        let info = self
            .upstream(
                "get package info",
                self.registry
                    .get_package_info(provider, version, &platform, &service_url),
            )
            .await?;
        let manifest = self
            .upstream(
                "fetch checksum manifest",
                self.registry.fetch(&info.manifest_url),
            )
            .await?;
        let signature = self
            .upstream(
                "fetch checksum manifest signature",
                self.registry.fetch(&info.signature_url),
            )
            .await?;

        self.trust
            .verify_and_parse(&manifest, &signature, &info.armored_keys)
            .map_err(|e| {
                metrics::TRUST_VERIFICATION_FAILURES.inc();
                tracing::warn!(
                    provider = %provider,
                    version = %version,
                    error = %e,
                    "checksum manifest rejected"
                );
                MirrorError::from(e)
            })
    }

    /// Delete a version mirror.
    ///
    /// Without `force`, a mirror that still owns platform mirrors is a conflict.
    /// With `force`, the catalog cascades to the platform mirrors and their
    /// stored packages are removed afterwards.
    #[tracing::instrument(skip(self, caller))]
    pub async fn delete_version_mirror(
        &self,
        caller: &dyn Caller,
        version_mirror_id: Uuid,
        force: bool,
    ) -> MirrorResult<()> {
        let mirror = self.load_version_mirror(version_mirror_id).await?;
        self.authorize(
            caller,
            Permission::DeleteProviderMirror,
            Scope::Group(mirror.group_id),
        )
        .await?;
        let group = self.load_group(mirror.group_id).await?;

        let event = activity_event(
            &group,
            caller,
            "delete",
            VERSION_MIRROR_TARGET,
            version_mirror_id,
            serde_json::json!({
                "provider": mirror.provider.to_string(),
                "version": mirror.version.to_string(),
                "force": force,
            }),
        );

        let mut tx = self.metadata.begin().await?;
        let deleted = delete_version_mirror_in(tx.as_mut(), &mirror, force, &event).await;
        let children = match deleted {
            Ok(children) => children,
            Err(e) => return Err(abandon(tx, e).await),
        };
        tx.commit().await?;

        metrics::VERSION_MIRRORS_DELETED.inc();
        tracing::info!(
            version_mirror_id = %version_mirror_id,
            group_id = %mirror.group_id,
            platform_mirrors = children.len(),
            force,
            "provider version mirror deleted"
        );

        for platform_mirror_id in children {
            self.delete_package_best_effort(platform_mirror_id).await;
        }
        Ok(())
    }

    /// Get a version mirror by ID.
    #[tracing::instrument(skip(self, caller))]
    pub async fn get_version_mirror_by_id(
        &self,
        caller: &dyn Caller,
        version_mirror_id: Uuid,
    ) -> MirrorResult<VersionMirror> {
        let mirror = self.load_version_mirror(version_mirror_id).await?;
        self.authorize(
            caller,
            Permission::ViewProviderMirror,
            Scope::Group(mirror.group_id),
        )
        .await?;
        Ok(mirror)
    }

    /// List the version mirrors of the root group owning `group_path`.
    #[tracing::instrument(skip(self, caller, input), fields(group_path = %input.group_path))]
    pub async fn get_version_mirrors(
        &self,
        caller: &dyn Caller,
        input: GetVersionMirrorsInput,
    ) -> MirrorResult<Page<VersionMirror>> {
        self.authorize(
            caller,
            Permission::ViewProviderMirror,
            Scope::NamespacePath(input.group_path.clone()),
        )
        .await?;
        let group = self.resolve_root_group(&input.group_path).await?;

        let filter = VersionMirrorFilter {
            group_id: Some(group.group_id),
            ..Default::default()
        };
        let page = self
            .metadata
            .list_version_mirrors(&filter, input.sort, input.pagination)
            .await?;

        Ok(Page {
            items: page
                .items
                .into_iter()
                .map(VersionMirror::try_from)
                .collect::<MirrorResult<_>>()?,
            total_count: page.total_count,
        })
    }

    // =========================================================================
    // Platform mirrors
    // =========================================================================

    /// Admit an installation package for one platform of a version mirror.
    ///
    /// The payload is hashed while it is spooled; a package whose digest does
    /// not match the verified manifest is never recorded.
    #[tracing::instrument(skip(self, caller, data))]
    pub async fn upload_installation_package<S>(
        &self,
        caller: &dyn Caller,
        version_mirror_id: Uuid,
        os: &str,
        arch: &str,
        data: S,
    ) -> MirrorResult<PlatformMirror>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send,
    {
        let parent = self.load_version_mirror(version_mirror_id).await?;
        self.authorize(
            caller,
            Permission::CreateProviderMirror,
            Scope::Group(parent.group_id),
        )
        .await?;

        let platform = Platform::new(os, arch)?;
        let duplicate = PlatformMirrorFilter {
            version_mirror_id: Some(version_mirror_id),
            os: Some(platform.os.clone()),
            arch: Some(platform.arch.clone()),
        };
        let existing = self
            .metadata
            .list_platform_mirrors(&duplicate, Sort::default(), Pagination::count_only())
            .await?
            .total_count;
        if existing > 0 {
            return Err(MirrorError::Conflict(format!(
                "an installation package for {platform} already exists for this version mirror"
            )));
        }

        let package = PackageName::new(&parent.provider.provider_type, &parent.version, &platform);
        let expected = parent.digests.get(&package).copied().ok_or_else(|| {
            tracing::error!(
                version_mirror_id = %version_mirror_id,
                package = %package,
                "digest table has no entry for package"
            );
            MirrorError::Internal(format!(
                "version mirror {version_mirror_id} has no recorded digest for {package}"
            ))
        })?;
        let group = self.load_group(parent.group_id).await?;

        let spooled = upload::spool(data, self.config.max_package_size_bytes).await?;
        if let Err(e) = spooled.digest().verify(&expected) {
            metrics::PACKAGES_REJECTED
                .with_label_values(&["digest_mismatch"])
                .inc();
            tracing::warn!(
                version_mirror_id = %version_mirror_id,
                package = %package,
                expected = %expected,
                actual = %spooled.digest(),
                "installation package digest mismatch"
            );
            return Err(MirrorError::from(e).context(format!("package {package} rejected")));
        }

        let id = Uuid::new_v4();
        let mirror = PlatformMirror {
            id,
            version_mirror_id,
            platform,
            resource_path: platform_resource_path(id),
            created_at: OffsetDateTime::now_utc(),
        };
        let row = PlatformMirrorRow {
            platform_mirror_id: id,
            version_mirror_id,
            os: mirror.platform.os.clone(),
            arch: mirror.platform.arch.clone(),
            resource_path: mirror.resource_path.clone(),
            created_at: mirror.created_at,
        };
        let event = activity_event(
            &group,
            caller,
            "create",
            PLATFORM_MIRROR_TARGET,
            id,
            serde_json::json!({
                "version_mirror_id": version_mirror_id,
                "platform": mirror.platform.key(),
                "size": spooled.size(),
            }),
        );

        // No catalog transaction is held while the package streams to the
        // store. The row is recorded afterwards, and the object is removed
        // again if that fails, so no row ever points at a missing package.
        if let Err(e) = self.packages.upload(id, spooled).await {
            metrics::PACKAGES_REJECTED
                .with_label_values(&["store_failure"])
                .inc();
            tracing::error!(
                platform_mirror_id = %id,
                backend = self.packages.backend_name(),
                error = %e,
                "failed to store installation package"
            );
            return Err(e.context("failed to store installation package"));
        }
        if let Err(e) = self.record_platform_mirror(&mirror, &row, &event).await {
            tracing::error!(
                platform_mirror_id = %id,
                error = %e,
                "failed to record stored installation package"
            );
            self.delete_package_best_effort(id).await;
            return Err(e);
        }

        metrics::PACKAGES_ADMITTED.inc();
        tracing::info!(
            platform_mirror_id = %id,
            version_mirror_id = %version_mirror_id,
            platform = %mirror.platform,
            "installation package admitted"
        );
        Ok(mirror)
    }

    /// Get a platform mirror by ID.
    #[tracing::instrument(skip(self, caller))]
    pub async fn get_platform_mirror_by_id(
        &self,
        caller: &dyn Caller,
        platform_mirror_id: Uuid,
    ) -> MirrorResult<PlatformMirror> {
        let (mirror, parent) = self.load_platform_mirror(platform_mirror_id).await?;
        self.authorize(
            caller,
            Permission::ViewProviderMirror,
            Scope::Group(parent.group_id),
        )
        .await?;
        Ok(mirror)
    }

    /// List the platform mirrors of a version mirror, optionally for one OS.
    #[tracing::instrument(skip(self, caller))]
    pub async fn get_platform_mirrors(
        &self,
        caller: &dyn Caller,
        version_mirror_id: Uuid,
        os: Option<&str>,
    ) -> MirrorResult<Vec<PlatformMirror>> {
        let parent = self.load_version_mirror(version_mirror_id).await?;
        self.authorize(
            caller,
            Permission::ViewProviderMirror,
            Scope::Group(parent.group_id),
        )
        .await?;

        let filter = PlatformMirrorFilter {
            version_mirror_id: Some(version_mirror_id),
            os: os.map(str::to_string),
            ..Default::default()
        };
        self.metadata
            .list_platform_mirrors(&filter, Sort::default(), Pagination::default())
            .await?
            .items
            .into_iter()
            .map(PlatformMirror::try_from)
            .collect()
    }

    /// Delete one platform mirror and its stored package.
    #[tracing::instrument(skip(self, caller))]
    pub async fn delete_platform_mirror(
        &self,
        caller: &dyn Caller,
        platform_mirror_id: Uuid,
    ) -> MirrorResult<()> {
        let (mirror, parent) = self.load_platform_mirror(platform_mirror_id).await?;
        self.authorize(
            caller,
            Permission::DeleteProviderMirror,
            Scope::Group(parent.group_id),
        )
        .await?;
        let group = self.load_group(parent.group_id).await?;

        let event = activity_event(
            &group,
            caller,
            "delete",
            PLATFORM_MIRROR_TARGET,
            platform_mirror_id,
            serde_json::json!({
                "version_mirror_id": parent.id,
                "platform": mirror.platform.key(),
            }),
        );

        let mut tx = self.metadata.begin().await?;
        let deleted = async {
            tx.delete_platform_mirror(platform_mirror_id).await?;
            tx.insert_activity_event(&event).await?;
            Ok::<_, MirrorError>(())
        }
        .await;
        if let Err(e) = deleted {
            return Err(abandon(tx, e).await);
        }
        tx.commit().await?;

        tracing::info!(
            platform_mirror_id = %platform_mirror_id,
            version_mirror_id = %parent.id,
            "platform mirror deleted"
        );
        self.delete_package_best_effort(platform_mirror_id).await;
        Ok(())
    }

    // =========================================================================
    // Mirror protocol reads
    // =========================================================================

    /// Versions of a provider that have at least one admitted package, oldest first.
    #[tracing::instrument(skip(self, caller, query), fields(group_path = %query.group_path))]
    pub async fn get_available_versions(
        &self,
        caller: &dyn Caller,
        query: &ProviderQuery,
    ) -> MirrorResult<Vec<SemanticVersion>> {
        self.authorize(
            caller,
            Permission::ViewProviderMirror,
            Scope::NamespacePath(query.group_path.clone()),
        )
        .await?;
        let group = self.resolve_root_group(&query.group_path).await?;
        let provider = Provider::parse(
            &query.registry_hostname,
            &query.registry_namespace,
            &query.provider_type,
        )?;

        let filter = VersionMirrorFilter {
            has_packages: Some(true),
            ..provider_filter(&group, &provider)
        };
        self.metadata
            .list_version_mirrors(&filter, Sort::CreatedAtAsc, Pagination::default())
            .await?
            .items
            .into_iter()
            .map(|row| VersionMirror::try_from(row).map(|mirror| mirror.version))
            .collect()
    }

    /// Download locations for every admitted package of a version, keyed by
    /// `{os}_{arch}`.
    #[tracing::instrument(skip(self, caller, query), fields(group_path = %query.group_path))]
    pub async fn get_available_installation_packages(
        &self,
        caller: &dyn Caller,
        query: &ProviderQuery,
        version: &str,
    ) -> MirrorResult<BTreeMap<String, InstallationPackage>> {
        self.authorize(
            caller,
            Permission::ViewProviderMirror,
            Scope::NamespacePath(query.group_path.clone()),
        )
        .await?;
        let group = self.resolve_root_group(&query.group_path).await?;
        let provider = Provider::parse(
            &query.registry_hostname,
            &query.registry_namespace,
            &query.provider_type,
        )?;
        let version = SemanticVersion::parse(version)?;

        let filter = VersionMirrorFilter {
            semantic_version: Some(version.to_string()),
            ..provider_filter(&group, &provider)
        };
        let row = self
            .metadata
            .list_version_mirrors(&filter, Sort::default(), Pagination::first(1))
            .await?
            .items
            .into_iter()
            .next()
            .ok_or_else(|| {
                MirrorError::NotFound(format!(
                    "version {version} of provider {provider} is not mirrored"
                ))
            })?;
        let mirror = VersionMirror::try_from(row)?;

        let platforms = self
            .metadata
            .list_platform_mirrors(
                &PlatformMirrorFilter {
                    version_mirror_id: Some(mirror.id),
                    ..Default::default()
                },
                Sort::default(),
                Pagination::default(),
            )
            .await?;

        let mut packages = BTreeMap::new();
        for row in platforms.items {
            let platform_mirror = PlatformMirror::try_from(row)?;
            let package = PackageName::new(
                &mirror.provider.provider_type,
                &mirror.version,
                &platform_mirror.platform,
            );
            let digest = mirror.digests.get(&package).copied().ok_or_else(|| {
                MirrorError::Internal(format!(
                    "version mirror {} has no recorded digest for {package}",
                    mirror.id
                ))
            })?;
            let url = self
                .packages
                .presigned_url(platform_mirror.id, self.config.presigned_url_expiry())
                .await?;
            packages.insert(
                platform_mirror.platform.key(),
                InstallationPackage { url, digest },
            );
        }
        Ok(packages)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn authorize(
        &self,
        caller: &dyn Caller,
        permission: Permission,
        scope: Scope,
    ) -> MirrorResult<()> {
        caller
            .require_permission(permission, &scope)
            .await
            .inspect_err(|e| {
                tracing::debug!(
                    subject = caller.subject(),
                    permission = %permission,
                    scope = %scope,
                    error = %e,
                    "permission denied"
                );
            })
    }

    /// Bound an upstream registry call by the configured timeout.
    async fn upstream<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, RegistryError>>,
    ) -> MirrorResult<T> {
        match tokio::time::timeout(self.config.registry_timeout(), call).await {
            Ok(result) => {
                result.map_err(|e| MirrorError::from(e).context(format!("failed to {operation}")))
            }
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_secs = self.config.registry_timeout_secs,
                    "upstream registry request timed out"
                );
                Err(MirrorError::from(RegistryError::Timeout)
                    .context(format!("failed to {operation}")))
            }
        }
    }

    async fn resolve_group(&self, full_path: &str) -> MirrorResult<GroupRow> {
        self.metadata
            .get_group_by_path(full_path)
            .await?
            .ok_or_else(|| MirrorError::NotFound(format!("group {full_path}")))
    }

    /// Mirrors belong to root groups; any path inside a tenant reads its root's mirrors.
    async fn resolve_root_group(&self, full_path: &str) -> MirrorResult<GroupRow> {
        let root_path = full_path.split('/').next().unwrap_or(full_path);
        let group = self.resolve_group(root_path).await?;
        if !group.is_root() {
            return Err(MirrorError::Internal(format!(
                "group {root_path} has a parent but no parent path"
            )));
        }
        Ok(group)
    }

    async fn load_group(&self, group_id: Uuid) -> MirrorResult<GroupRow> {
        self.metadata
            .get_group(group_id)
            .await?
            .ok_or_else(|| MirrorError::NotFound(format!("group {group_id}")))
    }

    async fn load_version_mirror(&self, version_mirror_id: Uuid) -> MirrorResult<VersionMirror> {
        self.metadata
            .get_version_mirror(version_mirror_id)
            .await?
            .ok_or_else(|| {
                MirrorError::NotFound(format!("provider version mirror {version_mirror_id}"))
            })?
            .try_into()
    }

    async fn load_platform_mirror(
        &self,
        platform_mirror_id: Uuid,
    ) -> MirrorResult<(PlatformMirror, VersionMirror)> {
        let mirror: PlatformMirror = self
            .metadata
            .get_platform_mirror(platform_mirror_id)
            .await?
            .ok_or_else(|| MirrorError::NotFound(format!("platform mirror {platform_mirror_id}")))?
            .try_into()?;
        let parent = self.load_version_mirror(mirror.version_mirror_id).await?;
        Ok((mirror, parent))
    }

    async fn record_platform_mirror(
        &self,
        mirror: &PlatformMirror,
        row: &PlatformMirrorRow,
        event: &ActivityEventRow,
    ) -> MirrorResult<()> {
        let mut tx = self.metadata.begin().await?;
        let staged = stage_platform_mirror(tx.as_mut(), mirror, row, event).await;
        if let Err(e) = staged {
            return Err(abandon(tx, e).await);
        }
        tx.commit()
            .await
            .map_err(|e| MirrorError::from(e).context("failed to record installation package"))
    }

    async fn delete_package_best_effort(&self, platform_mirror_id: Uuid) {
        if let Err(e) = self.packages.delete(platform_mirror_id).await {
            tracing::warn!(
                platform_mirror_id = %platform_mirror_id,
                error = %e,
                "failed to delete stored installation package"
            );
        }
    }
}

/// Returns the IDs of the platform mirrors removed along with the version mirror.
async fn delete_version_mirror_in(
    tx: &mut dyn MirrorTransaction,
    mirror: &VersionMirror,
    force: bool,
    event: &ActivityEventRow,
) -> MirrorResult<Vec<Uuid>> {
    let children = tx
        .list_platform_mirrors(
            &PlatformMirrorFilter {
                version_mirror_id: Some(mirror.id),
                ..Default::default()
            },
            Sort::default(),
            Pagination::default(),
        )
        .await?;
    if !force && children.total_count > 0 {
        return Err(MirrorError::Conflict(format!(
            "provider version mirror has {} platform mirrors; use force to delete it",
            children.total_count
        )));
    }

    tx.delete_version_mirror(mirror.id).await?;
    tx.insert_activity_event(event).await?;
    Ok(children
        .items
        .into_iter()
        .map(|child| child.platform_mirror_id)
        .collect())
}

async fn stage_platform_mirror(
    tx: &mut dyn MirrorTransaction,
    mirror: &PlatformMirror,
    row: &PlatformMirrorRow,
    event: &ActivityEventRow,
) -> MirrorResult<()> {
    tx.insert_platform_mirror(row).await.map_err(|e| match e {
        MetadataError::AlreadyExists(_) => MirrorError::Conflict(format!(
            "an installation package for {} already exists for this version mirror",
            mirror.platform
        )),
        other => other.into(),
    })?;
    tx.insert_activity_event(event).await?;
    Ok(())
}

/// Roll back after a failed step, keeping the original error.
async fn abandon(tx: Box<dyn MirrorTransaction>, err: MirrorError) -> MirrorError {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::warn!(error = %rollback_err, "transaction rollback failed");
    }
    err
}

fn provider_filter(group: &GroupRow, provider: &Provider) -> VersionMirrorFilter {
    VersionMirrorFilter {
        group_id: Some(group.group_id),
        registry_hostname: Some(provider.hostname.clone()),
        registry_namespace: Some(provider.namespace.clone()),
        provider_type: Some(provider.provider_type.clone()),
        ..Default::default()
    }
}

fn activity_event(
    group: &GroupRow,
    caller: &dyn Caller,
    action: &str,
    target_type: &str,
    target_id: Uuid,
    payload: serde_json::Value,
) -> ActivityEventRow {
    ActivityEventRow {
        event_id: Uuid::new_v4(),
        group_id: group.group_id,
        namespace_path: group.full_path.clone(),
        action: action.to_string(),
        target_type: target_type.to_string(),
        target_id,
        payload: Some(payload.to_string()),
        actor: caller.subject().to_string(),
        created_at: OffsetDateTime::now_utc(),
    }
}
