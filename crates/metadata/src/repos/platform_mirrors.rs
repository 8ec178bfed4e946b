//! Platform mirror repository trait.

use crate::error::MetadataResult;
use crate::models::PlatformMirrorRow;
use crate::query::{Page, Pagination, PlatformMirrorFilter, Sort};
use async_trait::async_trait;
use uuid::Uuid;

/// Read access to platform mirrors outside a transaction.
#[async_trait]
pub trait PlatformMirrorRepo: Send + Sync {
    /// Get a platform mirror by ID.
    async fn get_platform_mirror(
        &self,
        platform_mirror_id: Uuid,
    ) -> MetadataResult<Option<PlatformMirrorRow>>;

    /// List platform mirrors matching a filter.
    async fn list_platform_mirrors(
        &self,
        filter: &PlatformMirrorFilter,
        sort: Sort,
        pagination: Pagination,
    ) -> MetadataResult<Page<PlatformMirrorRow>>;
}
