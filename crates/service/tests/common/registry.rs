//! In-memory upstream registry.

use async_trait::async_trait;
use bytes::Bytes;
use depot_core::{Platform, Provider, SemanticVersion};
use depot_service::{PackageInfo, RegistryError, RegistryProtocolClient, VersionInfo};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Serves versions, package info and files registered with [`StaticRegistry::publish`].
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
#[derive(Default)]
pub struct StaticRegistry {
    versions: Mutex<HashMap<String, Vec<VersionInfo>>>,
    packages: Mutex<HashMap<(String, String), PackageInfo>>,
    files: Mutex<HashMap<String, Bytes>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

/// One upstream release: its platforms and signed manifest.
#[allow(dead_code)]
pub struct Release<'a> {
    pub version: &'a str,
    pub platforms: &'a [(&'a str, &'a str)],
    pub manifest: Bytes,
    pub signature: Bytes,
    pub armored_keys: Vec<String>,
}

#[allow(dead_code)]
impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a release of `provider` available upstream.
    pub fn publish(&self, provider: &Provider, release: Release<'_>) {
        let base = format!(
            "https://releases.test/{}/{}/{}",
            provider.namespace, provider.provider_type, release.version
        );
        let manifest_url = format!("{base}/SHA256SUMS");
        let signature_url = format!("{base}/SHA256SUMS.sig");

        let platforms = release
            .platforms
            .iter()
            .map(|(os, arch)| Platform::new(os, arch).expect("valid platform"))
            .collect();
        self.versions
            .lock()
            .unwrap()
            .entry(provider.to_string())
            .or_default()
            .push(VersionInfo {
                version: release.version.to_string(),
                platforms,
            });
        self.packages.lock().unwrap().insert(
            (provider.to_string(), release.version.to_string()),
            PackageInfo {
                manifest_url: manifest_url.clone(),
                signature_url: signature_url.clone(),
                armored_keys: release.armored_keys,
            },
        );
        let mut files = self.files.lock().unwrap();
        files.insert(manifest_url, release.manifest);
        files.insert(signature_url, release.signature);
    }

    /// Delay every call, to exercise the request timeout.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of registry calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RegistryProtocolClient for StaticRegistry {
    async fn discover_service_url(&self, hostname: &str) -> Result<String, RegistryError> {
        self.enter().await;
        Ok(format!("https://{hostname}/v1/providers/"))
    }

    async fn list_versions(
        &self,
        provider: &Provider,
        _service_url: &str,
    ) -> Result<Vec<VersionInfo>, RegistryError> {
        self.enter().await;
        Ok(self
            .versions
            .lock()
            .unwrap()
            .get(&provider.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_package_info(
        &self,
        provider: &Provider,
        version: &SemanticVersion,
        _platform: &Platform,
        _service_url: &str,
    ) -> Result<PackageInfo, RegistryError> {
        self.enter().await;
        self.packages
            .lock()
            .unwrap()
            .get(&(provider.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::Request(format!("no package for {provider} {version}")))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, RegistryError> {
        self.enter().await;
        self.files
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RegistryError::Request(format!("{url} returned 404")))
    }
}
