//! Provider coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a DNS name, excluding any port suffix.
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single DNS label.
const MAX_LABEL_LEN: usize = 63;

/// Maximum length of a namespace or type part.
const MAX_PART_LEN: usize = 64;

/// A fully-qualified upstream provider: `hostname/namespace/type`.
///
/// All three parts are stored in their canonical lowercase form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provider {
    pub hostname: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub provider_type: String,
}

impl Provider {
    /// Validate and canonicalize provider coordinates.
    pub fn parse(hostname: &str, namespace: &str, provider_type: &str) -> crate::Result<Self> {
        Ok(Self {
            hostname: normalize_hostname(hostname)?,
            namespace: parse_provider_part("namespace", namespace)?,
            provider_type: parse_provider_part("type", provider_type)?,
        })
    }

    /// The `namespace/type` source path without the hostname.
    pub fn source_path(&self) -> String {
        format!("{}/{}", self.namespace, self.provider_type)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.hostname, self.namespace, self.provider_type
        )
    }
}

/// Normalize a service hostname, optionally carrying a `:port` suffix.
///
/// Only ASCII names are accepted; internationalized hostnames must be supplied
/// in their punycode form.
pub fn normalize_hostname(given: &str) -> crate::Result<String> {
    let invalid = |reason: &str| crate::Error::InvalidProvider(format!("hostname {given:?} {reason}"));

    if given.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if !given.is_ascii() {
        return Err(invalid("must be ASCII (use punycode for internationalized names)"));
    }

    let lowered = given.to_ascii_lowercase();
    let (host, port) = match lowered.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (lowered.as_str(), None),
    };

    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p > 0 && !port.starts_with('0') => {}
            _ => return Err(invalid("has an invalid port")),
        }
    }

    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > MAX_HOSTNAME_LEN {
        return Err(invalid("has an invalid length"));
    }

    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid("contains an empty or oversized label"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("contains a label with a leading or trailing dash"));
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid("contains disallowed characters"));
        }
    }

    Ok(match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Validate a namespace or type part and return its canonical lowercase form.
pub fn parse_provider_part(what: &str, given: &str) -> crate::Result<String> {
    let invalid = |reason: &str| crate::Error::InvalidProvider(format!("{what} {given:?} {reason}"));

    if given.is_empty() {
        return Err(invalid("must have at least one character"));
    }
    if given.len() > MAX_PART_LEN {
        return Err(invalid("is too long"));
    }
    if given.contains("--") {
        return Err(invalid("cannot use multiple consecutive dashes"));
    }
    if given.starts_with('-') || given.ends_with('-') {
        return Err(invalid("cannot start or end with a dash"));
    }
    if !given.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(invalid("must contain only letters, digits, and dashes"));
    }

    Ok(given.to_ascii_lowercase())
}
