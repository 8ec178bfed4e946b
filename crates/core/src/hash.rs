//! SHA-256 content hashes and incremental hashing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of a SHA-256 digest in bytes.
pub const SHA256_LEN: usize = 32;

/// A SHA-256 content hash represented as 32 bytes.
///
/// Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; SHA256_LEN]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn from_bytes(bytes: [u8; SHA256_LEN]) -> Self {
        Self(bytes)
    }

    /// Create a ContentHash from a byte slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let arr: [u8; SHA256_LEN] = bytes.try_into().map_err(|_| {
            crate::Error::InvalidHash(format!(
                "expected {SHA256_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SHA256_LEN] {
        &self.0
    }

    /// Compute SHA-256 hash of data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Create an incremental hasher.
    pub fn hasher() -> ContentHasher {
        ContentHasher(Sha256::new())
    }

    /// Parse from a 64 character hex string (either case).
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != SHA256_LEN * 2 {
            return Err(crate::Error::InvalidHash(format!(
                "expected {} hex chars, got {}",
                SHA256_LEN * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; SHA256_LEN];
        for (i, pair) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(pair).map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidHash(format!("{e}: {hex_str:?}")))?;
        }
        Ok(Self(bytes))
    }

    /// Encode as lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Compare against an expected hash, returning a mismatch error on difference.
    pub fn verify(&self, expected: &ContentHash) -> crate::Result<()> {
        if self != expected {
            return Err(crate::Error::HashMismatch {
                expected: expected.to_hex(),
                actual: self.to_hex(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 hasher.
pub struct ContentHasher(Sha256);

impl ContentHasher {
    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> ContentHash {
        ContentHash(self.0.finalize().into())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        ContentHash::hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE_DATA_SHA256: &str =
        "5f0ba01fa9b567c766a6f60c1ea51c691cbf04fa4939a118e6cde5c475319311";

    #[test]
    fn test_compute_known_vector() {
        let hash = ContentHash::compute(b"package-data");
        assert_eq!(hash.to_hex(), PACKAGE_DATA_SHA256);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut hasher = ContentHash::hasher();
        hasher.update(b"package-");
        hasher.update(b"data");
        assert_eq!(hasher.finalize(), ContentHash::compute(b"package-data"));
    }

    #[test]
    fn test_from_hex_accepts_uppercase() {
        let upper = PACKAGE_DATA_SHA256.to_uppercase();
        let hash = ContentHash::from_hex(&upper).unwrap();
        assert_eq!(hash.to_hex(), PACKAGE_DATA_SHA256);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(ContentHash::from_hex("abcd").is_err());
        let not_hex = "zz".repeat(32);
        assert!(ContentHash::from_hex(&not_hex).is_err());
    }

    #[test]
    fn test_from_slice_requires_32_bytes() {
        assert!(ContentHash::from_slice(&[0u8; 31]).is_err());
        assert!(ContentHash::from_slice(&[0u8; 33]).is_err());
        assert!(ContentHash::from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn test_verify_reports_mismatch() {
        let expected = ContentHash::compute(b"package-data");
        let actual = ContentHash::compute(b"invalid-data");
        match actual.verify(&expected) {
            Err(crate::Error::HashMismatch { expected: e, .. }) => {
                assert_eq!(e, PACKAGE_DATA_SHA256)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_serde_uses_hex() {
        let hash = ContentHash::compute(b"package-data");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{PACKAGE_DATA_SHA256}\""));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
