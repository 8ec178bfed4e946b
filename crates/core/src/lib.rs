//! Core domain types for the depot provider mirror.
//!
//! This crate defines the value types shared by every other crate:
//! - SHA-256 content hashes and incremental hashing
//! - Provider coordinates (hostname, namespace, type)
//! - Target platforms and canonical package filenames
//! - Checksum manifest parsing into a digest table
//! - Semantic version validation
//! - Shared configuration

pub mod checksums;
pub mod config;
pub mod error;
pub mod hash;
pub mod package;
pub mod provider;
pub mod version;

pub use checksums::DigestTable;
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use package::{PackageName, Platform};
pub use provider::Provider;
pub use version::SemanticVersion;

/// Default hostname of the public provider registry.
pub const DEFAULT_REGISTRY_HOSTNAME: &str = "registry.terraform.io";
