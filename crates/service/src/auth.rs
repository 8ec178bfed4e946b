//! Authorization contract.
//!
//! Authentication happens in whatever transport fronts the service; it hands
//! the service a [`Caller`] that answers permission checks.

use crate::error::MirrorResult;
use async_trait::async_trait;
use std::fmt;
use uuid::Uuid;

/// Provider mirror permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewProviderMirror,
    CreateProviderMirror,
    DeleteProviderMirror,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewProviderMirror => "view_terraform_provider_mirror",
            Self::CreateProviderMirror => "create_terraform_provider_mirror",
            Self::DeleteProviderMirror => "delete_terraform_provider_mirror",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a permission is checked against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A group known by ID.
    Group(Uuid),
    /// A group known only by path, checked before it is resolved.
    NamespacePath(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "group {id}"),
            Self::NamespacePath(path) => write!(f, "namespace {path}"),
        }
    }
}

/// An authenticated principal.
#[async_trait]
pub trait Caller: Send + Sync {
    /// Stable identifier recorded as `created_by` and as the activity actor.
    fn subject(&self) -> &str;

    /// Fail with [`MirrorError::Forbidden`](crate::MirrorError::Forbidden)
    /// unless the caller holds `permission` on `scope`.
    async fn require_permission(&self, permission: Permission, scope: &Scope) -> MirrorResult<()>;
}
