//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Provider mirror behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Version mirrors allowed per root group when no resource limit row exists.
    #[serde(default = "default_version_mirror_limit")]
    pub default_version_mirror_limit: u32,
    /// Lifetime of package download URLs in seconds.
    #[serde(default = "default_presigned_url_expiry_secs")]
    pub presigned_url_expiry_secs: u64,
    /// Timeout for each upstream registry request in seconds.
    #[serde(default = "default_registry_timeout_secs")]
    pub registry_timeout_secs: u64,
    /// Largest package accepted by an upload, in bytes.
    #[serde(default = "default_max_package_size_bytes")]
    pub max_package_size_bytes: u64,
}

fn default_version_mirror_limit() -> u32 {
    1000
}

fn default_presigned_url_expiry_secs() -> u64 {
    3600 // 1 hour
}

fn default_registry_timeout_secs() -> u64 {
    60
}

fn default_max_package_size_bytes() -> u64 {
    1024 * 1024 * 1024 // 1 GiB
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            default_version_mirror_limit: default_version_mirror_limit(),
            presigned_url_expiry_secs: default_presigned_url_expiry_secs(),
            registry_timeout_secs: default_registry_timeout_secs(),
            max_package_size_bytes: default_max_package_size_bytes(),
        }
    }
}

impl MirrorConfig {
    /// Download URL lifetime.
    pub fn presigned_url_expiry(&self) -> Duration {
        Duration::from_secs(self.presigned_url_expiry_secs)
    }

    /// Upstream registry request timeout.
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    /// Validate mirror configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.presigned_url_expiry_secs == 0 {
            return Err("mirror.presigned_url_expiry_secs must be greater than zero".to_string());
        }
        if self.registry_timeout_secs == 0 {
            return Err("mirror.registry_timeout_secs must be greater than zero".to_string());
        }
        if self.max_package_size_bytes == 0 {
            return Err("mirror.max_package_size_bytes must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Content store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
        /// Base URL under which the root directory is served (e.g. by a sidecar).
        #[serde(default = "default_public_base_url")]
        public_base_url: String,
        /// Secret used to sign download URLs.
        /// WARNING: Prefer DEPOT_STORAGE__URL_SIGNING_KEY over storing it in config files.
        url_signing_key: Option<String>,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs. Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080/packages".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
            public_base_url: default_public_base_url(),
            url_signing_key: None,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem {
                public_base_url,
                url_signing_key,
                ..
            } => {
                if !(public_base_url.starts_with("http://")
                    || public_base_url.starts_with("https://"))
                {
                    return Err(format!(
                        "filesystem public_base_url must be an http(s) URL, got {public_base_url:?}"
                    ));
                }
                if url_signing_key.as_deref().is_some_and(str::is_empty) {
                    return Err("filesystem url_signing_key must not be empty".to_string());
                }
                Ok(())
            }
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long a writer waits for the database lock, in seconds.
        #[serde(default = "default_sqlite_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
}

fn default_sqlite_busy_timeout_secs() -> u64 {
    5
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            busy_timeout_secs: default_sqlite_busy_timeout_secs(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Content store configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Provider mirror behaviour.
    #[serde(default)]
    pub mirror: MirrorConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.mirror.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_config_defaults() {
        let config: MirrorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_version_mirror_limit, 1000);
        assert_eq!(config.presigned_url_expiry(), Duration::from_secs(3600));
        assert_eq!(config.registry_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_mirror_config_rejects_zero_timeout() {
        let config = MirrorConfig {
            registry_timeout_secs: 0,
            ..MirrorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_config_filesystem_defaults() {
        let json = r#"{"type":"filesystem","path":"/srv/depot"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        match &config {
            StorageConfig::Filesystem {
                public_base_url,
                url_signing_key,
                ..
            } => {
                assert_eq!(public_base_url, "http://127.0.0.1:8080/packages");
                assert!(url_signing_key.is_none());
            }
            _ => panic!("expected filesystem config"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_config_filesystem_rejects_non_http_base() {
        let config = StorageConfig::Filesystem {
            path: PathBuf::from("/srv/depot"),
            public_base_url: "ftp://mirror".to_string(),
            url_signing_key: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_config_s3_validate_partial_credentials() {
        let invalid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(invalid.validate().is_err());

        let valid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: Some("secret-key".to_string()),
            force_path_style: false,
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_storage_config_s3_force_path_style_defaults_to_false() {
        let json = r#"{"type":"s3","bucket":"test","endpoint":"https://s3.amazonaws.com"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();

        match config {
            StorageConfig::S3 {
                force_path_style, ..
            } => assert!(!force_path_style),
            _ => panic!("expected S3 config"),
        }
    }

    #[test]
    fn test_app_config_from_empty_document() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert!(matches!(config.metadata, MetadataConfig::Sqlite { .. }));
        assert!(config.validate().is_ok());
    }
}
