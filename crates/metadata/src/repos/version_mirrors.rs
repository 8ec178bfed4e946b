//! Version mirror repository trait.

use crate::error::MetadataResult;
use crate::models::VersionMirrorRow;
use crate::query::{Page, Pagination, Sort, VersionMirrorFilter};
use async_trait::async_trait;
use uuid::Uuid;

/// Read access to version mirrors outside a transaction.
#[async_trait]
pub trait VersionMirrorRepo: Send + Sync {
    /// Get a version mirror by ID.
    async fn get_version_mirror(
        &self,
        version_mirror_id: Uuid,
    ) -> MetadataResult<Option<VersionMirrorRow>>;

    /// List version mirrors matching a filter.
    async fn list_version_mirrors(
        &self,
        filter: &VersionMirrorFilter,
        sort: Sort,
        pagination: Pagination,
    ) -> MetadataResult<Page<VersionMirrorRow>>;
}
