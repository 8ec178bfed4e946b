//! OpenPGP detached-signature verification.

use crate::error::{SignerError, SignerResult};
use crate::verifier::SignatureVerifier;
use pgp::types::PublicKeyTrait;
use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use std::io::Cursor;

/// Armor header that marks an ASCII-armored signature.
const ARMORED_SIGNATURE_HEADER: &[u8] = b"-----BEGIN PGP SIGNATURE-----";

/// Verifies detached OpenPGP signatures with the `pgp` crate.
///
/// The signature may be binary (as registries publish `SHA256SUMS.sig`) or
/// ASCII-armored. A signature made by the primary key or by any of its public
/// subkeys is accepted.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenPgpVerifier;

impl OpenPgpVerifier {
    /// Create a new verifier.
    pub fn new() -> Self {
        Self
    }
}

/// Parse an ASCII-armored public key block.
pub fn parse_armored_key(armored: &str) -> SignerResult<SignedPublicKey> {
    let (key, _headers) = SignedPublicKey::from_string(armored)
        .map_err(|e| SignerError::KeyParsing(format!("invalid armored public key: {e}")))?;
    Ok(key)
}

/// Parse a detached signature in binary or armored form.
pub fn parse_signature(signature: &[u8]) -> SignerResult<StandaloneSignature> {
    let trimmed = trim_leading_whitespace(signature);
    if trimmed.starts_with(ARMORED_SIGNATURE_HEADER) {
        let (sig, _headers) = StandaloneSignature::from_armor_single(Cursor::new(trimmed))
            .map_err(|e| SignerError::InvalidSignature(format!("invalid armored signature: {e}")))?;
        return Ok(sig);
    }

    StandaloneSignature::from_bytes(Cursor::new(signature))
        .map_err(|e| SignerError::InvalidSignature(format!("invalid binary signature: {e}")))
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

impl SignatureVerifier for OpenPgpVerifier {
    fn verify_detached(
        &self,
        message: &[u8],
        signature: &[u8],
        armored_key: &str,
    ) -> SignerResult<()> {
        let key = parse_armored_key(armored_key)?;
        let signature = parse_signature(signature)?;

        if signature.verify(&key, message).is_ok() {
            return Ok(());
        }

        for subkey in &key.public_subkeys {
            if signature.verify(subkey, message).is_ok() {
                tracing::debug!(
                    primary_key_id = ?key.key_id(),
                    subkey_id = ?subkey.key_id(),
                    "detached signature verified by subkey"
                );
                return Ok(());
            }
        }

        Err(SignerError::VerificationFailed)
    }
}
