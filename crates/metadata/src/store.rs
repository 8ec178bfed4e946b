//! Metadata store trait and the SQLite implementation.

use crate::error::MetadataResult;
use crate::queries;
use crate::repos::{
    ActivityRepo, GroupRepo, MirrorTransaction, PlatformMirrorRepo, ResourceLimitRepo,
    VersionMirrorRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    GroupRepo
    + VersionMirrorRepo
    + PlatformMirrorRepo
    + ResourceLimitRepo
    + ActivityRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Open a transaction for multi-step catalog writes.
    async fn begin(&self) -> MetadataResult<Box<dyn MirrorTransaction>>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub async fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Required for the platform_mirrors cascade.
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        // A single connection serializes writers, which also serializes the
        // quota count against the insert that follows it. Callers keep
        // transactions free of store and network I/O.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened sqlite metadata store");
        Ok(store)
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> MetadataResult<Box<dyn MirrorTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// Transaction handle returned by [`SqliteStore::begin`].
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

mod sqlite_impl {
    use super::*;
    use crate::error::MetadataError;
    use crate::models::*;
    use crate::query::{Page, Pagination, PlatformMirrorFilter, Sort, VersionMirrorFilter};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl GroupRepo for SqliteStore {
        async fn create_group(&self, group: &GroupRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO groups (group_id, parent_id, name, full_path, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(group.group_id)
            .bind(group.parent_id)
            .bind(&group.name)
            .bind(&group.full_path)
            .bind(group.created_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_group(&self, group_id: Uuid) -> MetadataResult<Option<GroupRow>> {
            let row = sqlx::query_as::<_, GroupRow>("SELECT * FROM groups WHERE group_id = ?")
                .bind(group_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_group_by_path(&self, full_path: &str) -> MetadataResult<Option<GroupRow>> {
            let row = sqlx::query_as::<_, GroupRow>("SELECT * FROM groups WHERE full_path = ?")
                .bind(full_path)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl VersionMirrorRepo for SqliteStore {
        async fn get_version_mirror(
            &self,
            version_mirror_id: Uuid,
        ) -> MetadataResult<Option<VersionMirrorRow>> {
            let mut conn = self.pool.acquire().await?;
            queries::get_version_mirror(&mut conn, version_mirror_id).await
        }

        async fn list_version_mirrors(
            &self,
            filter: &VersionMirrorFilter,
            sort: Sort,
            pagination: Pagination,
        ) -> MetadataResult<Page<VersionMirrorRow>> {
            let mut conn = self.pool.acquire().await?;
            queries::list_version_mirrors(&mut conn, filter, sort, pagination).await
        }
    }

    #[async_trait]
    impl PlatformMirrorRepo for SqliteStore {
        async fn get_platform_mirror(
            &self,
            platform_mirror_id: Uuid,
        ) -> MetadataResult<Option<PlatformMirrorRow>> {
            let mut conn = self.pool.acquire().await?;
            queries::get_platform_mirror(&mut conn, platform_mirror_id).await
        }

        async fn list_platform_mirrors(
            &self,
            filter: &PlatformMirrorFilter,
            sort: Sort,
            pagination: Pagination,
        ) -> MetadataResult<Page<PlatformMirrorRow>> {
            let mut conn = self.pool.acquire().await?;
            queries::list_platform_mirrors(&mut conn, filter, sort, pagination).await
        }
    }

    #[async_trait]
    impl ResourceLimitRepo for SqliteStore {
        async fn set_resource_limit(
            &self,
            kind: ResourceLimitKind,
            scope_group_id: Option<Uuid>,
            value: i64,
        ) -> MetadataResult<()> {
            if value < 0 {
                return Err(MetadataError::Constraint(format!(
                    "resource limit {kind} must not be negative"
                )));
            }

            // NULL scopes never collide in a unique index, so replace explicitly.
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM resource_limits WHERE kind = ? AND scope_group_id IS ?")
                .bind(kind.as_str())
                .bind(scope_group_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO resource_limits (kind, scope_group_id, value, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(kind.as_str())
            .bind(scope_group_id)
            .bind(value)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(())
        }

        async fn get_resource_limit(
            &self,
            kind: ResourceLimitKind,
            scope_group_id: Option<Uuid>,
        ) -> MetadataResult<Option<i64>> {
            let value: Option<i64> = sqlx::query_scalar(
                "SELECT value FROM resource_limits WHERE kind = ? AND scope_group_id IS ?",
            )
            .bind(kind.as_str())
            .bind(scope_group_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(value)
        }

        async fn delete_resource_limit(
            &self,
            kind: ResourceLimitKind,
            scope_group_id: Option<Uuid>,
        ) -> MetadataResult<bool> {
            let result =
                sqlx::query("DELETE FROM resource_limits WHERE kind = ? AND scope_group_id IS ?")
                    .bind(kind.as_str())
                    .bind(scope_group_id)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() > 0)
        }
    }

    #[async_trait]
    impl ActivityRepo for SqliteStore {
        async fn list_activity_events(
            &self,
            group_id: Uuid,
        ) -> MetadataResult<Vec<ActivityEventRow>> {
            let rows = sqlx::query_as::<_, ActivityEventRow>(
                "SELECT * FROM activity_events WHERE group_id = ? ORDER BY created_at, rowid",
            )
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl MirrorTransaction for SqliteTransaction {
        async fn list_version_mirrors(
            &mut self,
            filter: &VersionMirrorFilter,
            sort: Sort,
            pagination: Pagination,
        ) -> MetadataResult<Page<VersionMirrorRow>> {
            queries::list_version_mirrors(&mut self.tx, filter, sort, pagination).await
        }

        async fn insert_version_mirror(&mut self, mirror: &VersionMirrorRow) -> MetadataResult<()> {
            queries::insert_version_mirror(&mut self.tx, mirror).await
        }

        async fn delete_version_mirror(&mut self, version_mirror_id: Uuid) -> MetadataResult<()> {
            queries::delete_version_mirror(&mut self.tx, version_mirror_id).await
        }

        async fn list_platform_mirrors(
            &mut self,
            filter: &PlatformMirrorFilter,
            sort: Sort,
            pagination: Pagination,
        ) -> MetadataResult<Page<PlatformMirrorRow>> {
            queries::list_platform_mirrors(&mut self.tx, filter, sort, pagination).await
        }

        async fn insert_platform_mirror(
            &mut self,
            mirror: &PlatformMirrorRow,
        ) -> MetadataResult<()> {
            queries::insert_platform_mirror(&mut self.tx, mirror).await
        }

        async fn delete_platform_mirror(&mut self, platform_mirror_id: Uuid) -> MetadataResult<()> {
            queries::delete_platform_mirror(&mut self.tx, platform_mirror_id).await
        }

        async fn resolve_resource_limit(
            &mut self,
            kind: ResourceLimitKind,
            group_id: Uuid,
        ) -> MetadataResult<Option<i64>> {
            queries::resolve_resource_limit(&mut self.tx, kind, group_id).await
        }

        async fn insert_activity_event(&mut self, event: &ActivityEventRow) -> MetadataResult<()> {
            queries::insert_activity_event(&mut self.tx, event).await
        }

        async fn commit(self: Box<Self>) -> MetadataResult<()> {
            self.tx.commit().await?;
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> MetadataResult<()> {
            self.tx.rollback().await?;
            Ok(())
        }
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    group_id BLOB PRIMARY KEY,
    parent_id BLOB REFERENCES groups(group_id),
    name TEXT NOT NULL,
    full_path TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_groups_parent ON groups(parent_id);

CREATE TABLE IF NOT EXISTS version_mirrors (
    version_mirror_id BLOB PRIMARY KEY,
    group_id BLOB NOT NULL REFERENCES groups(group_id),
    registry_hostname TEXT NOT NULL,
    registry_namespace TEXT NOT NULL,
    provider_type TEXT NOT NULL,
    semantic_version TEXT NOT NULL,
    digests TEXT NOT NULL,
    created_by TEXT NOT NULL,
    resource_path TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_version_mirrors_provider_version
    ON version_mirrors(group_id, registry_hostname, registry_namespace, provider_type, semantic_version);
CREATE INDEX IF NOT EXISTS idx_version_mirrors_created ON version_mirrors(group_id, created_at);

CREATE TABLE IF NOT EXISTS platform_mirrors (
    platform_mirror_id BLOB PRIMARY KEY,
    version_mirror_id BLOB NOT NULL REFERENCES version_mirrors(version_mirror_id) ON DELETE CASCADE,
    os TEXT NOT NULL,
    arch TEXT NOT NULL,
    resource_path TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_platform_mirrors_platform
    ON platform_mirrors(version_mirror_id, os, arch);

CREATE TABLE IF NOT EXISTS resource_limits (
    kind TEXT NOT NULL,
    scope_group_id BLOB REFERENCES groups(group_id) ON DELETE CASCADE,
    value INTEGER NOT NULL CHECK (value >= 0),
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resource_limits_kind ON resource_limits(kind, scope_group_id);

CREATE TABLE IF NOT EXISTS activity_events (
    event_id BLOB PRIMARY KEY,
    group_id BLOB NOT NULL,
    namespace_path TEXT NOT NULL,
    action TEXT NOT NULL,
    target_type TEXT NOT NULL,
    target_id BLOB NOT NULL,
    payload TEXT,
    actor TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activity_events_group ON activity_events(group_id, created_at);
"#;
