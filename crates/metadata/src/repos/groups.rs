//! Group repository trait.

use crate::error::MetadataResult;
use crate::models::GroupRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for the group tree.
#[async_trait]
pub trait GroupRepo: Send + Sync {
    /// Create a group. The parent, if any, must already exist.
    async fn create_group(&self, group: &GroupRow) -> MetadataResult<()>;

    /// Get a group by ID.
    async fn get_group(&self, group_id: Uuid) -> MetadataResult<Option<GroupRow>>;

    /// Get a group by its full path.
    async fn get_group_by_path(&self, full_path: &str) -> MetadataResult<Option<GroupRow>>;
}
