//! Service error taxonomy.

use depot_metadata::MetadataError;
use depot_signer::SignerError;
use depot_storage::StorageError;

use crate::registry::RegistryError;

/// Machine-checkable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input, an unverifiable upstream artifact, a quota hit or a
    /// digest mismatch.
    Invalid,
    NotFound,
    /// The caller lacks the required permission.
    Forbidden,
    /// The request collides with existing state.
    Conflict,
    /// A failure the caller cannot fix. Details are not exposed.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider mirror error type.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Core(#[from] depot_core::Error),

    #[error("checksum manifest rejected: {0}")]
    Signer(#[from] SignerError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MirrorError>,
    },
}

impl MirrorError {
    /// The error category, looking through any added context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Invalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) => ErrorKind::Internal,
            Self::Metadata(e) => match e {
                MetadataError::NotFound(_) => ErrorKind::NotFound,
                MetadataError::AlreadyExists(_) => ErrorKind::Conflict,
                _ => ErrorKind::Internal,
            },
            Self::Storage(_) => ErrorKind::Internal,
            Self::Core(_) => ErrorKind::Invalid,
            Self::Signer(_) => ErrorKind::Invalid,
            Self::Registry(_) => ErrorKind::Internal,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::Metadata(_) => "metadata_error",
            Self::Storage(_) => "storage_error",
            Self::Core(_) => "invalid_input",
            Self::Signer(SignerError::Manifest(_)) => "malformed_manifest",
            Self::Signer(_) => "untrusted_manifest",
            Self::Registry(_) => "registry_error",
            Self::Context { source, .. } => source.code(),
        }
    }

    /// Wrap with context, keeping the kind and code.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Message safe to return to a caller.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for service operations.
pub type MirrorResult<T> = std::result::Result<T, MirrorError>;
