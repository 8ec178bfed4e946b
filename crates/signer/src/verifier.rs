//! Manifest trust verification.

use crate::error::{SignerError, SignerResult};
use crate::openpgp::OpenPgpVerifier;
use depot_core::DigestTable;

/// A detached-signature primitive.
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `message` with a single armored public key.
    fn verify_detached(&self, message: &[u8], signature: &[u8], armored_key: &str)
    -> SignerResult<()>;
}

/// Verifies a checksum manifest against candidate keys and parses it.
///
/// Upstream registries publish several signing keys per namespace and sign with
/// any one of them, so verification succeeds as soon as one key verifies.
#[derive(Clone, Debug, Default)]
pub struct TrustVerifier<V = OpenPgpVerifier> {
    verifier: V,
}

impl TrustVerifier<OpenPgpVerifier> {
    /// Create a verifier backed by OpenPGP.
    pub fn openpgp() -> Self {
        Self::new(OpenPgpVerifier::new())
    }
}

impl<V: SignatureVerifier> TrustVerifier<V> {
    /// Create a verifier around a signature primitive.
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }

    /// Verify the manifest signature and parse the manifest into a digest table.
    ///
    /// The manifest is not inspected until a key has verified it.
    pub fn verify_and_parse(
        &self,
        manifest: &[u8],
        signature: &[u8],
        armored_keys: &[String],
    ) -> SignerResult<DigestTable> {
        self.verify(manifest, signature, armored_keys)?;
        Ok(DigestTable::parse(manifest)?)
    }

    /// Verify the manifest signature without parsing.
    ///
    /// Returns the index of the key that verified.
    pub fn verify(
        &self,
        manifest: &[u8],
        signature: &[u8],
        armored_keys: &[String],
    ) -> SignerResult<usize> {
        if armored_keys.is_empty() {
            return Err(SignerError::NoKeys);
        }

        for (index, key) in armored_keys.iter().enumerate() {
            match self.verifier.verify_detached(manifest, signature, key) {
                Ok(()) => {
                    tracing::debug!(key_index = index, "checksum manifest signature verified");
                    return Ok(index);
                }
                Err(e) => {
                    tracing::debug!(key_index = index, error = %e, "key did not verify manifest");
                }
            }
        }

        tracing::warn!(
            attempted = armored_keys.len(),
            "checksum manifest signature did not verify against any supplied key"
        );
        Err(SignerError::Untrusted {
            attempted: armored_keys.len(),
        })
    }
}
