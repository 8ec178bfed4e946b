//! Per-group version mirror limit.

use crate::error::{MirrorError, MirrorResult};
use crate::metrics;
use depot_metadata::models::ResourceLimitKind;
use depot_metadata::{MirrorTransaction, Pagination, Sort, VersionMirrorFilter};
use uuid::Uuid;

/// Checks the version mirror count of a root group against its limit.
///
/// The check runs inside the caller's transaction so the count and the insert
/// that follows observe the same snapshot. Two concurrent creations can still
/// both pass unless the store serializes writers.
#[derive(Debug, Clone, Copy)]
pub struct QuotaEnforcer {
    default_limit: u32,
}

impl QuotaEnforcer {
    /// `default_limit` applies when neither a group nor a global limit is set.
    pub fn new(default_limit: u32) -> Self {
        Self { default_limit }
    }

    /// Effective limit for a group.
    pub async fn version_mirror_limit(
        &self,
        tx: &mut dyn MirrorTransaction,
        group_id: Uuid,
    ) -> MirrorResult<u64> {
        let configured = tx
            .resolve_resource_limit(
                ResourceLimitKind::TerraformProviderVersionMirrorsPerGroup,
                group_id,
            )
            .await?;
        Ok(match configured {
            Some(limit) => u64::try_from(limit).unwrap_or(0),
            None => u64::from(self.default_limit),
        })
    }

    /// Fail with an invalid error if one more version mirror would exceed the limit.
    pub async fn check_version_mirror_quota(
        &self,
        tx: &mut dyn MirrorTransaction,
        group_id: Uuid,
    ) -> MirrorResult<()> {
        let limit = self.version_mirror_limit(tx, group_id).await?;
        let filter = VersionMirrorFilter {
            group_id: Some(group_id),
            ..Default::default()
        };
        let existing = tx
            .list_version_mirrors(&filter, Sort::default(), Pagination::count_only())
            .await?
            .total_count;

        if existing >= limit {
            metrics::QUOTA_REJECTIONS.inc();
            tracing::warn!(
                group_id = %group_id,
                existing,
                limit,
                "version mirror quota exceeded"
            );
            return Err(MirrorError::Invalid(format!(
                "quota exceeded: group already has {existing} of {limit} allowed provider version mirrors"
            )));
        }
        Ok(())
    }
}
