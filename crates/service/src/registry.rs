//! Upstream provider registry contract.

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{Platform, Provider, SemanticVersion};

/// Failure talking to an upstream registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Request(String),

    #[error("malformed registry response: {0}")]
    Malformed(String),

    #[error("registry request timed out")]
    Timeout,
}

/// One version advertised by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version string as the registry reports it.
    pub version: String,
    pub platforms: Vec<Platform>,
}

/// Where to fetch the checksum manifest for a version, and which keys may sign it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub manifest_url: String,
    pub signature_url: String,
    pub armored_keys: Vec<String>,
}

/// Client for the provider registry protocol.
///
/// Implementations perform no retries; the service bounds every call with the
/// configured registry timeout.
#[async_trait]
pub trait RegistryProtocolClient: Send + Sync {
    /// Resolve the providers service URL for a registry host.
    async fn discover_service_url(&self, hostname: &str) -> Result<String, RegistryError> {
        Ok(format!("https://{hostname}/v1/providers/"))
    }

    async fn list_versions(
        &self,
        provider: &Provider,
        service_url: &str,
    ) -> Result<Vec<VersionInfo>, RegistryError>;

    async fn get_package_info(
        &self,
        provider: &Provider,
        version: &SemanticVersion,
        platform: &Platform,
        service_url: &str,
    ) -> Result<PackageInfo, RegistryError>;

    /// Fetch raw bytes, used for the manifest and its signature.
    async fn fetch(&self, url: &str) -> Result<Bytes, RegistryError>;
}
