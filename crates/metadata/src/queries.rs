//! Connection-level SQL shared by the store and its transactions.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ActivityEventRow, PlatformMirrorRow, ResourceLimitKind, VersionMirrorRow};
use crate::query::{Page, Pagination, PlatformMirrorFilter, Sort, VersionMirrorFilter};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

fn push_version_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &VersionMirrorFilter) {
    if let Some(group_id) = filter.group_id {
        qb.push(" AND vm.group_id = ").push_bind(group_id);
    }
    if let Some(hostname) = &filter.registry_hostname {
        qb.push(" AND vm.registry_hostname = ")
            .push_bind(hostname.clone());
    }
    if let Some(namespace) = &filter.registry_namespace {
        qb.push(" AND vm.registry_namespace = ")
            .push_bind(namespace.clone());
    }
    if let Some(provider_type) = &filter.provider_type {
        qb.push(" AND vm.provider_type = ")
            .push_bind(provider_type.clone());
    }
    if let Some(version) = &filter.semantic_version {
        qb.push(" AND vm.semantic_version = ")
            .push_bind(version.clone());
    }
    match filter.has_packages {
        Some(true) => {
            qb.push(
                " AND EXISTS (SELECT 1 FROM platform_mirrors pm WHERE pm.version_mirror_id = vm.version_mirror_id)",
            );
        }
        Some(false) => {
            qb.push(
                " AND NOT EXISTS (SELECT 1 FROM platform_mirrors pm WHERE pm.version_mirror_id = vm.version_mirror_id)",
            );
        }
        None => {}
    }
}

fn push_platform_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PlatformMirrorFilter) {
    if let Some(version_mirror_id) = filter.version_mirror_id {
        qb.push(" AND pm.version_mirror_id = ")
            .push_bind(version_mirror_id);
    }
    if let Some(os) = &filter.os {
        qb.push(" AND pm.os = ").push_bind(os.clone());
    }
    if let Some(arch) = &filter.arch {
        qb.push(" AND pm.arch = ").push_bind(arch.clone());
    }
}

fn push_pagination(qb: &mut QueryBuilder<'_, Sqlite>, pagination: Pagination) {
    match pagination.limit {
        Some(limit) => {
            qb.push(" LIMIT ").push_bind(i64::from(limit));
        }
        // SQLite requires a LIMIT before OFFSET; -1 means unbounded.
        None if pagination.offset > 0 => {
            qb.push(" LIMIT -1");
        }
        None => return,
    }
    qb.push(" OFFSET ").push_bind(i64::from(pagination.offset));
}

fn to_count(total: i64) -> u64 {
    u64::try_from(total).unwrap_or(0)
}

pub(crate) async fn list_version_mirrors(
    conn: &mut SqliteConnection,
    filter: &VersionMirrorFilter,
    sort: Sort,
    pagination: Pagination,
) -> MetadataResult<Page<VersionMirrorRow>> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM version_mirrors vm WHERE 1 = 1");
    push_version_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

    if pagination.is_count_only() {
        return Ok(Page {
            items: Vec::new(),
            total_count: to_count(total),
        });
    }

    let mut select = QueryBuilder::<Sqlite>::new("SELECT vm.* FROM version_mirrors vm WHERE 1 = 1");
    push_version_filter(&mut select, filter);
    select.push(sort.order_by("vm"));
    push_pagination(&mut select, pagination);
    let items = select
        .build_query_as::<VersionMirrorRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(Page {
        items,
        total_count: to_count(total),
    })
}

pub(crate) async fn get_version_mirror(
    conn: &mut SqliteConnection,
    version_mirror_id: Uuid,
) -> MetadataResult<Option<VersionMirrorRow>> {
    let row = sqlx::query_as::<_, VersionMirrorRow>(
        "SELECT * FROM version_mirrors WHERE version_mirror_id = ?",
    )
    .bind(version_mirror_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

pub(crate) async fn insert_version_mirror(
    conn: &mut SqliteConnection,
    mirror: &VersionMirrorRow,
) -> MetadataResult<()> {
    sqlx::query(
        "INSERT INTO version_mirrors (version_mirror_id, group_id, registry_hostname, registry_namespace, \
         provider_type, semantic_version, digests, created_by, resource_path, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(mirror.version_mirror_id)
    .bind(mirror.group_id)
    .bind(&mirror.registry_hostname)
    .bind(&mirror.registry_namespace)
    .bind(&mirror.provider_type)
    .bind(&mirror.semantic_version)
    .bind(&mirror.digests)
    .bind(&mirror.created_by)
    .bind(&mirror.resource_path)
    .bind(mirror.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn delete_version_mirror(
    conn: &mut SqliteConnection,
    version_mirror_id: Uuid,
) -> MetadataResult<()> {
    let result = sqlx::query("DELETE FROM version_mirrors WHERE version_mirror_id = ?")
        .bind(version_mirror_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetadataError::NotFound(format!(
            "version mirror {version_mirror_id} not found"
        )));
    }
    Ok(())
}

pub(crate) async fn list_platform_mirrors(
    conn: &mut SqliteConnection,
    filter: &PlatformMirrorFilter,
    sort: Sort,
    pagination: Pagination,
) -> MetadataResult<Page<PlatformMirrorRow>> {
    let mut count =
        QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM platform_mirrors pm WHERE 1 = 1");
    push_platform_filter(&mut count, filter);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;

    if pagination.is_count_only() {
        return Ok(Page {
            items: Vec::new(),
            total_count: to_count(total),
        });
    }

    let mut select =
        QueryBuilder::<Sqlite>::new("SELECT pm.* FROM platform_mirrors pm WHERE 1 = 1");
    push_platform_filter(&mut select, filter);
    select.push(sort.order_by("pm"));
    push_pagination(&mut select, pagination);
    let items = select
        .build_query_as::<PlatformMirrorRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(Page {
        items,
        total_count: to_count(total),
    })
}

pub(crate) async fn get_platform_mirror(
    conn: &mut SqliteConnection,
    platform_mirror_id: Uuid,
) -> MetadataResult<Option<PlatformMirrorRow>> {
    let row = sqlx::query_as::<_, PlatformMirrorRow>(
        "SELECT * FROM platform_mirrors WHERE platform_mirror_id = ?",
    )
    .bind(platform_mirror_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

pub(crate) async fn insert_platform_mirror(
    conn: &mut SqliteConnection,
    mirror: &PlatformMirrorRow,
) -> MetadataResult<()> {
    sqlx::query(
        "INSERT INTO platform_mirrors (platform_mirror_id, version_mirror_id, os, arch, resource_path, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(mirror.platform_mirror_id)
    .bind(mirror.version_mirror_id)
    .bind(&mirror.os)
    .bind(&mirror.arch)
    .bind(&mirror.resource_path)
    .bind(mirror.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn delete_platform_mirror(
    conn: &mut SqliteConnection,
    platform_mirror_id: Uuid,
) -> MetadataResult<()> {
    let result = sqlx::query("DELETE FROM platform_mirrors WHERE platform_mirror_id = ?")
        .bind(platform_mirror_id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(MetadataError::NotFound(format!(
            "platform mirror {platform_mirror_id} not found"
        )));
    }
    Ok(())
}

pub(crate) async fn resolve_resource_limit(
    conn: &mut SqliteConnection,
    kind: ResourceLimitKind,
    group_id: Uuid,
) -> MetadataResult<Option<i64>> {
    // Group-scoped rows sort before the global (NULL scope) row.
    let value: Option<i64> = sqlx::query_scalar(
        "SELECT value FROM resource_limits \
         WHERE kind = ? AND (scope_group_id = ? OR scope_group_id IS NULL) \
         ORDER BY scope_group_id IS NULL ASC LIMIT 1",
    )
    .bind(kind.as_str())
    .bind(group_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(value)
}

pub(crate) async fn insert_activity_event(
    conn: &mut SqliteConnection,
    event: &ActivityEventRow,
) -> MetadataResult<()> {
    sqlx::query(
        "INSERT INTO activity_events (event_id, group_id, namespace_path, action, target_type, \
         target_id, payload, actor, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.event_id)
    .bind(event.group_id)
    .bind(&event.namespace_path)
    .bind(&event.action)
    .bind(&event.target_type)
    .bind(event.target_id)
    .bind(&event.payload)
    .bind(&event.actor)
    .bind(event.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
