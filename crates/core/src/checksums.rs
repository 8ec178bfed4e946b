//! Checksum manifest parsing.
//!
//! Upstream registries publish a `SHA256SUMS` file per provider version listing
//! every platform package:
//!
//! ```text
//! 5f0ba01fa9b567c766a6f60c1ea51c691cbf04fa4939a118e6cde5c475319311  terraform-provider-example_1.2.3_linux_amd64.zip
//! ```
//!
//! Parsing is strict. Any line that does not match `<64 hex chars><two spaces><filename>`
//! rejects the whole manifest, as does a filename listed twice.

use crate::hash::{ContentHash, SHA256_LEN};
use crate::package::PackageName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator between digest and filename.
const SEPARATOR: &str = "  ";

/// Mapping from canonical package filename to its SHA-256 digest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigestTable(BTreeMap<String, ContentHash>);

impl DigestTable {
    /// Parse a checksum manifest.
    pub fn parse(manifest: &[u8]) -> crate::Result<Self> {
        let text = std::str::from_utf8(manifest).map_err(|e| crate::Error::ManifestIntegrity {
            line: 0,
            reason: format!("manifest is not valid UTF-8: {e}"),
        })?;

        // A single trailing newline terminates the last entry.
        let body = text.strip_suffix('\n').unwrap_or(text);
        if body.is_empty() {
            return Ok(Self::default());
        }

        let mut entries = BTreeMap::new();
        for (idx, line) in body.split('\n').enumerate() {
            let line_no = idx + 1;
            let (digest, filename) = parse_line(line_no, line)?;
            if entries.insert(filename.to_string(), digest).is_some() {
                return Err(crate::Error::ManifestIntegrity {
                    line: line_no,
                    reason: format!("duplicate entry for {filename:?}"),
                });
            }
        }

        Ok(Self(entries))
    }

    /// Look up the digest for a package.
    pub fn get(&self, package: &PackageName) -> Option<&ContentHash> {
        self.0.get(package.as_str())
    }

    /// Look up the digest for a raw filename.
    pub fn get_by_filename(&self, filename: &str) -> Option<&ContentHash> {
        self.0.get(filename)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate entries in filename order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContentHash)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Serialize to JSON (filename -> hex digest) for persistence.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

impl FromIterator<(String, ContentHash)> for DigestTable {
    fn from_iter<I: IntoIterator<Item = (String, ContentHash)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn parse_line(line_no: usize, line: &str) -> crate::Result<(ContentHash, &str)> {
    let malformed = |reason: String| crate::Error::ManifestIntegrity {
        line: line_no,
        reason,
    };

    let (hex, filename) = line
        .split_once(SEPARATOR)
        .ok_or_else(|| malformed("expected '<sha256>  <filename>'".to_string()))?;

    if hex.len() != SHA256_LEN * 2 {
        return Err(malformed(format!(
            "digest must be {} hex characters, got {}",
            SHA256_LEN * 2,
            hex.len()
        )));
    }
    let digest = ContentHash::from_hex(hex).map_err(|e| malformed(e.to_string()))?;

    if filename.is_empty() {
        return Err(malformed("missing filename".to_string()));
    }
    if filename.trim() != filename || filename.contains(char::is_whitespace) {
        return Err(malformed(format!("filename {filename:?} contains whitespace")));
    }

    Ok((digest, filename))
}
