//! Activity event repository trait.

use crate::error::MetadataResult;
use crate::models::ActivityEventRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Read access to recorded activity. Events are written inside a
/// [`MirrorTransaction`](super::MirrorTransaction).
#[async_trait]
pub trait ActivityRepo: Send + Sync {
    /// List events for a group, oldest first.
    async fn list_activity_events(&self, group_id: Uuid) -> MetadataResult<Vec<ActivityEventRow>>;
}
