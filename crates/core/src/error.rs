//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    #[error("invalid platform: {0}")]
    InvalidPlatform(String),

    #[error("invalid semantic version: {0}")]
    InvalidVersion(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("checksum manifest line {line}: {reason}")]
    ManifestIntegrity { line: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
