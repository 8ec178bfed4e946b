//! Signer error types.

use thiserror::Error;

/// Trust verification errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("no public keys supplied for signature verification")]
    NoKeys,

    #[error("key parsing error: {0}")]
    KeyParsing(String),

    #[error("invalid signature format: {0}")]
    InvalidSignature(String),

    #[error("verification failed")]
    VerificationFailed,

    #[error("checksum manifest signature did not verify against any of {attempted} supplied keys")]
    Untrusted { attempted: usize },

    #[error("malformed checksum manifest: {0}")]
    Manifest(#[from] depot_core::Error),
}

/// Result type for trust verification.
pub type SignerResult<T> = std::result::Result<T, SignerError>;
