//! Database models mapping to the mirror catalog schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Groups
// =============================================================================

/// Group record. Groups form a tree; a group without a parent is a root group.
#[derive(Debug, Clone, FromRow)]
pub struct GroupRow {
    pub group_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    /// Slash-separated path from the root, e.g. `acme/platform`.
    pub full_path: String,
    pub created_at: OffsetDateTime,
}

impl GroupRow {
    /// Whether this group is a tenant root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

// =============================================================================
// Version mirrors
// =============================================================================

/// Cached provider version with its verified digest table.
#[derive(Debug, Clone, FromRow)]
pub struct VersionMirrorRow {
    pub version_mirror_id: Uuid,
    pub group_id: Uuid,
    pub registry_hostname: String,
    pub registry_namespace: String,
    pub provider_type: String,
    pub semantic_version: String,
    /// JSON object of package filename to hex SHA-256, written once at creation.
    pub digests: String,
    pub created_by: String,
    /// Stable external reference, e.g. `provider-mirror/versions/{id}`.
    pub resource_path: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Platform mirrors
// =============================================================================

/// One admitted platform package belonging to a version mirror.
#[derive(Debug, Clone, FromRow)]
pub struct PlatformMirrorRow {
    pub platform_mirror_id: Uuid,
    pub version_mirror_id: Uuid,
    pub os: String,
    pub arch: String,
    pub resource_path: String,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Resource limits
// =============================================================================

/// Kinds of configurable resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceLimitKind {
    TerraformProviderVersionMirrorsPerGroup,
}

impl ResourceLimitKind {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerraformProviderVersionMirrorsPerGroup => {
                "terraform_provider_version_mirrors_per_group"
            }
        }
    }
}

impl std::fmt::Display for ResourceLimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceLimitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "terraform_provider_version_mirrors_per_group" => {
                Ok(Self::TerraformProviderVersionMirrorsPerGroup)
            }
            _ => Err(format!("unknown resource limit kind: {s}")),
        }
    }
}

/// Limit value. A NULL scope applies globally.
#[derive(Debug, Clone, FromRow)]
pub struct ResourceLimitRow {
    pub kind: String,
    pub scope_group_id: Option<Uuid>,
    pub value: i64,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Activity events
// =============================================================================

/// Audit record of a catalog mutation.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityEventRow {
    pub event_id: Uuid,
    pub group_id: Uuid,
    pub namespace_path: String,
    /// e.g. `create`, `delete`.
    pub action: String,
    /// e.g. `terraform_provider_version_mirror`.
    pub target_type: String,
    pub target_id: Uuid,
    /// Optional JSON payload.
    pub payload: Option<String>,
    pub actor: String,
    pub created_at: OffsetDateTime,
}
