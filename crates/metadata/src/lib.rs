//! Mirror catalog persistence for depot.
//!
//! This crate provides the provider mirror data model:
//! - Groups and their root/child structure
//! - Version mirrors with their verified digest tables
//! - Platform mirrors for admitted packages
//! - Resource limits and activity events

pub mod error;
pub mod models;
pub mod query;
mod queries;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use query::{Page, Pagination, PlatformMirrorFilter, Sort, VersionMirrorFilter};
pub use repos::MirrorTransaction;
pub use store::{MetadataStore, SqliteStore, SqliteTransaction};

use depot_core::config::MetadataConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            busy_timeout_secs,
        } => {
            let store = SqliteStore::new(path, Duration::from_secs(*busy_timeout_secs)).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
