//! Target platforms and canonical package filenames.

use crate::version::SemanticVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an OS or architecture identifier.
const MAX_PLATFORM_PART_LEN: usize = 32;

/// An operating system / architecture pair, e.g. `linux_amd64`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    /// Validate and construct a platform.
    ///
    /// Both parts must be non-empty lowercase alphanumerics; underscores are
    /// reserved as the `os_arch` separator.
    pub fn new(os: &str, arch: &str) -> crate::Result<Self> {
        Ok(Self {
            os: validate_part("os", os)?,
            arch: validate_part("arch", arch)?,
        })
    }

    /// Parse an `os_arch` key.
    pub fn parse_key(key: &str) -> crate::Result<Self> {
        let (os, arch) = key
            .split_once('_')
            .ok_or_else(|| crate::Error::InvalidPlatform(format!("{key:?} is not os_arch")))?;
        Self::new(os, arch)
    }

    /// The `os_arch` key used in mirror listings.
    pub fn key(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

fn validate_part(what: &str, given: &str) -> crate::Result<String> {
    if given.is_empty() || given.len() > MAX_PLATFORM_PART_LEN {
        return Err(crate::Error::InvalidPlatform(format!(
            "{what} {given:?} has an invalid length"
        )));
    }
    if !given
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(crate::Error::InvalidPlatform(format!(
            "{what} {given:?} must contain only lowercase letters and digits"
        )));
    }
    Ok(given.to_string())
}

/// Canonical provider package filename.
///
/// The same name keys the upstream checksum manifest and therefore the digest
/// table recorded on a version mirror, so its format must never change:
/// `terraform-provider-{type}_{version}_{os}_{arch}.zip`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Derive the package filename for a provider type, version and platform.
    pub fn new(provider_type: &str, version: &SemanticVersion, platform: &Platform) -> Self {
        Self(format!(
            "terraform-provider-{}_{}_{}_{}.zip",
            provider_type, version, platform.os, platform.arch
        ))
    }

    /// Get the filename.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
