//! Service-level views of catalog records.

use crate::error::{MirrorError, MirrorResult};
use depot_core::{ContentHash, DigestTable, Platform, Provider, SemanticVersion};
use depot_metadata::models::{PlatformMirrorRow, VersionMirrorRow};
use depot_metadata::{Pagination, Sort};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A provider version cached for a root group.
#[derive(Debug, Clone, Serialize)]
pub struct VersionMirror {
    pub id: Uuid,
    pub group_id: Uuid,
    pub provider: Provider,
    pub version: SemanticVersion,
    pub digests: DigestTable,
    pub created_by: String,
    pub resource_path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<VersionMirrorRow> for VersionMirror {
    type Error = MirrorError;

    fn try_from(row: VersionMirrorRow) -> MirrorResult<Self> {
        let corrupt = |what: &str, e: depot_core::Error| {
            MirrorError::Internal(format!(
                "version mirror {} has an unreadable {what}: {e}",
                row.version_mirror_id
            ))
        };
        let provider = Provider::parse(
            &row.registry_hostname,
            &row.registry_namespace,
            &row.provider_type,
        )
        .map_err(|e| corrupt("provider", e))?;
        let version =
            SemanticVersion::parse(&row.semantic_version).map_err(|e| corrupt("version", e))?;
        let digests = DigestTable::from_json(&row.digests).map_err(|e| corrupt("digest table", e))?;

        Ok(Self {
            id: row.version_mirror_id,
            group_id: row.group_id,
            provider,
            version,
            digests,
            created_by: row.created_by,
            resource_path: row.resource_path,
            created_at: row.created_at,
        })
    }
}

/// One admitted installation package.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformMirror {
    pub id: Uuid,
    pub version_mirror_id: Uuid,
    pub platform: Platform,
    pub resource_path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TryFrom<PlatformMirrorRow> for PlatformMirror {
    type Error = MirrorError;

    fn try_from(row: PlatformMirrorRow) -> MirrorResult<Self> {
        let platform = Platform::new(&row.os, &row.arch).map_err(|e| {
            MirrorError::Internal(format!(
                "platform mirror {} has an unreadable platform: {e}",
                row.platform_mirror_id
            ))
        })?;
        Ok(Self {
            id: row.platform_mirror_id,
            version_mirror_id: row.version_mirror_id,
            platform,
            resource_path: row.resource_path,
            created_at: row.created_at,
        })
    }
}

/// Request to mirror one provider version into a root group.
#[derive(Debug, Clone)]
pub struct CreateVersionMirrorInput {
    pub group_path: String,
    pub registry_hostname: String,
    pub registry_namespace: String,
    pub provider_type: String,
    pub semantic_version: String,
}

/// Listing request for a group's version mirrors.
#[derive(Debug, Clone, Default)]
pub struct GetVersionMirrorsInput {
    pub group_path: String,
    pub sort: Sort,
    pub pagination: Pagination,
}

/// Provider coordinates as addressed by mirror clients.
#[derive(Debug, Clone)]
pub struct ProviderQuery {
    pub group_path: String,
    pub registry_hostname: String,
    pub registry_namespace: String,
    pub provider_type: String,
}

/// Where to download an admitted package and what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationPackage {
    pub url: String,
    pub digest: ContentHash,
}
