//! Resource limit repository trait.

use crate::error::MetadataResult;
use crate::models::ResourceLimitKind;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for configured resource limits.
#[async_trait]
pub trait ResourceLimitRepo: Send + Sync {
    /// Set a limit. `scope_group_id: None` sets the global value.
    async fn set_resource_limit(
        &self,
        kind: ResourceLimitKind,
        scope_group_id: Option<Uuid>,
        value: i64,
    ) -> MetadataResult<()>;

    /// Get the limit stored for exactly this scope.
    async fn get_resource_limit(
        &self,
        kind: ResourceLimitKind,
        scope_group_id: Option<Uuid>,
    ) -> MetadataResult<Option<i64>>;

    /// Remove the limit stored for exactly this scope.
    async fn delete_resource_limit(
        &self,
        kind: ResourceLimitKind,
        scope_group_id: Option<Uuid>,
    ) -> MetadataResult<bool>;
}
