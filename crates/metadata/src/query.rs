//! Filters, sorting and pagination for catalog listings.

use uuid::Uuid;

/// Filter for version mirror listings. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct VersionMirrorFilter {
    pub group_id: Option<Uuid>,
    pub registry_hostname: Option<String>,
    pub registry_namespace: Option<String>,
    pub provider_type: Option<String>,
    pub semantic_version: Option<String>,
    /// `Some(true)` keeps only mirrors owning at least one platform mirror.
    pub has_packages: Option<bool>,
}

/// Filter for platform mirror listings.
#[derive(Debug, Clone, Default)]
pub struct PlatformMirrorFilter {
    pub version_mirror_id: Option<Uuid>,
    pub os: Option<String>,
    pub arch: Option<String>,
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    #[default]
    CreatedAtAsc,
    CreatedAtDesc,
}

impl Sort {
    pub(crate) fn order_by(&self, table_alias: &str) -> String {
        // rowid breaks ties between rows created within the same timestamp.
        match self {
            Sort::CreatedAtAsc => {
                format!(" ORDER BY {table_alias}.created_at ASC, {table_alias}.rowid ASC")
            }
            Sort::CreatedAtDesc => {
                format!(" ORDER BY {table_alias}.created_at DESC, {table_alias}.rowid DESC")
            }
        }
    }
}

/// Page request. `limit: None` returns every remaining row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Pagination {
    /// A page that fetches no rows, only the total count.
    pub fn count_only() -> Self {
        Self {
            limit: Some(0),
            offset: 0,
        }
    }

    /// First `limit` rows.
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }

    pub(crate) fn is_count_only(&self) -> bool {
        self.limit == Some(0)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }
}
