//! Transactional catalog writes.

use crate::error::MetadataResult;
use crate::models::{ActivityEventRow, PlatformMirrorRow, ResourceLimitKind, VersionMirrorRow};
use crate::query::{Page, Pagination, PlatformMirrorFilter, Sort, VersionMirrorFilter};
use async_trait::async_trait;
use uuid::Uuid;

/// An open database transaction over the mirror catalog.
///
/// Dropping the handle without calling [`commit`](Self::commit) rolls back
/// every write made through it. While a transaction is open it may hold the
/// store's only connection, so callers must not issue reads through the store
/// itself until the transaction ends.
#[async_trait]
pub trait MirrorTransaction: Send {
    async fn list_version_mirrors(
        &mut self,
        filter: &VersionMirrorFilter,
        sort: Sort,
        pagination: Pagination,
    ) -> MetadataResult<Page<VersionMirrorRow>>;

    /// Insert a version mirror. A duplicate provider version within the group
    /// fails with `AlreadyExists`.
    async fn insert_version_mirror(&mut self, mirror: &VersionMirrorRow) -> MetadataResult<()>;

    /// Delete a version mirror and, by cascade, its platform mirrors.
    async fn delete_version_mirror(&mut self, version_mirror_id: Uuid) -> MetadataResult<()>;

    async fn list_platform_mirrors(
        &mut self,
        filter: &PlatformMirrorFilter,
        sort: Sort,
        pagination: Pagination,
    ) -> MetadataResult<Page<PlatformMirrorRow>>;

    /// Insert a platform mirror. A duplicate platform fails with `AlreadyExists`.
    async fn insert_platform_mirror(&mut self, mirror: &PlatformMirrorRow) -> MetadataResult<()>;

    async fn delete_platform_mirror(&mut self, platform_mirror_id: Uuid) -> MetadataResult<()>;

    /// Effective limit for a group: the group-scoped value, else the global one.
    async fn resolve_resource_limit(
        &mut self,
        kind: ResourceLimitKind,
        group_id: Uuid,
    ) -> MetadataResult<Option<i64>>;

    async fn insert_activity_event(&mut self, event: &ActivityEventRow) -> MetadataResult<()>;

    /// Commit every write made through this handle.
    async fn commit(self: Box<Self>) -> MetadataResult<()>;

    /// Discard every write made through this handle.
    async fn rollback(self: Box<Self>) -> MetadataResult<()>;
}
