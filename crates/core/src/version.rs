//! Strict semantic versions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A strictly-parsed semantic version (`MAJOR.MINOR.PATCH[-PRE][+BUILD]`).
///
/// A leading `v` or a partial version such as `1.2` is rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticVersion(semver::Version);

impl SemanticVersion {
    /// Parse a version string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        semver::Version::parse(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidVersion(format!("{s:?}: {e}")))
    }

    /// Whether this is a pre-release version.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SemanticVersion {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
