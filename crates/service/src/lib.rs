//! Provider mirror service for depot.
//!
//! This crate ties the catalog, content store and trust verifier together:
//! - Creating version mirrors from signature-verified upstream manifests
//! - Admitting installation packages whose digests match those manifests
//! - Serving available versions and presigned package URLs
//! - Per-group quotas, activity events, metrics and configuration loading
//!
//! Transport concerns (HTTP routes, authentication) live outside this crate;
//! callers arrive as a [`Caller`] and upstream registries behind a
//! [`RegistryProtocolClient`].

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod packages;
pub mod quota;
pub mod registry;
pub mod service;
pub mod telemetry;
pub mod upload;

pub use auth::{Caller, Permission, Scope};
pub use error::{ErrorKind, MirrorError, MirrorResult};
pub use model::{
    CreateVersionMirrorInput, GetVersionMirrorsInput, InstallationPackage, PlatformMirror,
    ProviderQuery, VersionMirror,
};
pub use packages::{PackageStore, package_key};
pub use quota::QuotaEnforcer;
pub use registry::{PackageInfo, RegistryError, RegistryProtocolClient, VersionInfo};
pub use service::MirrorService;
