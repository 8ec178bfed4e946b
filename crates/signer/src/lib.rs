//! Trust verification for upstream provider checksum manifests.
//!
//! This crate provides:
//! - OpenPGP detached-signature verification against armored public keys
//! - The multi-key trust policy (the first key that verifies is sufficient)
//! - Parsing of a verified manifest into a digest table

pub mod error;
pub mod openpgp;
pub mod verifier;

pub use error::{SignerError, SignerResult};
pub use openpgp::OpenPgpVerifier;
pub use verifier::{SignatureVerifier, TrustVerifier};
