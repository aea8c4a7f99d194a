use models::Id;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

/// Channel on which job inserts are announced to running servers.
pub const NOTIFICATION_CHANNEL: &str = "vellum_jobs";

pub const INDEX_JOBS_TABLE: &str = "index_jobs";
pub const REINDEX_JOBS_TABLE: &str = "reindex_jobs";

/// Idempotent DDL of the durable job tables.
pub async fn ensure_tables(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        create table if not exists index_jobs (
            id bigserial primary key,
            namespace text not null,
            document_id uuid not null,
            attempts integer not null default 0,
            job_status jsonb not null default '{"type": "queued"}',
            wake_at timestamptz not null default now(),
            created_at timestamptz not null default now(),
            updated_at timestamptz not null default now()
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        create table if not exists reindex_jobs (
            id bigserial primary key,
            alias text not null,
            dest_index text not null,
            mapping jsonb not null,
            attempts integer not null default 0,
            job_status jsonb not null default '{"type": "queued"}',
            wake_at timestamptz not null default now(),
            created_at timestamptz not null default now(),
            updated_at timestamptz not null default now()
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// A dequeued `indexDocument` task.
#[derive(Debug)]
pub struct IndexJob {
    pub id: i64,
    pub namespace: String,
    pub document_id: Id,
    pub attempts: i32,
}

/// A dequeued `reindexNamespace` task.
#[derive(Debug)]
pub struct ReindexJob {
    pub id: i64,
    pub alias: String,
    pub dest_index: String,
    pub mapping: serde_json::Value,
    pub attempts: i32,
}

/// Enqueue an `indexDocument` task and wake listening servers. The insert
/// and NOTIFY run in one autocommitted statement, so listeners are woken
/// only once the job row is visible to them.
pub async fn enqueue_index(pool: &PgPool, namespace: &str, document_id: Id) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        with ins as (
            insert into index_jobs (namespace, document_id) values ($1, $2)
        )
        select pg_notify(
            $3,
            json_build_object('timestamp', now(), 'table', 'index_jobs')::text
        )
        "#,
    )
    .bind(namespace)
    .bind(document_id.as_uuid())
    .bind(NOTIFICATION_CHANNEL)
    .execute(pool)
    .await?;
    Ok(())
}

/// Enqueue a `reindexNamespace` task and wake listening servers.
pub async fn enqueue_reindex(
    pool: &PgPool,
    alias: &str,
    dest_index: &str,
    mapping: &serde_json::Value,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        with ins as (
            insert into reindex_jobs (alias, dest_index, mapping) values ($1, $2, $3)
        )
        select pg_notify(
            $4,
            json_build_object('timestamp', now(), 'table', 'reindex_jobs')::text
        )
        "#,
    )
    .bind(alias)
    .bind(dest_index)
    .bind(mapping)
    .bind(NOTIFICATION_CHANNEL)
    .execute(pool)
    .await?;
    Ok(())
}

/// Lock and return the oldest runnable `indexDocument` task, if any.
/// The row stays locked until the caller's transaction resolves it; a crashed
/// worker releases the lock and the job is picked up again.
pub async fn dequeue_index(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> sqlx::Result<Option<IndexJob>> {
    let row = sqlx::query(
        r#"
        select id, namespace, document_id, attempts
        from index_jobs
        where job_status->>'type' = 'queued' and wake_at <= now()
        order by id asc
        for update skip locked
        limit 1
        "#,
    )
    .fetch_optional(&mut **txn)
    .await?;

    row.map(|row| {
        Ok(IndexJob {
            id: row.try_get("id")?,
            namespace: row.try_get("namespace")?,
            document_id: Id::from(row.try_get::<Uuid, _>("document_id")?),
            attempts: row.try_get("attempts")?,
        })
    })
    .transpose()
}

/// Lock and return the oldest runnable `reindexNamespace` task, if any.
pub async fn dequeue_reindex(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> sqlx::Result<Option<ReindexJob>> {
    let row = sqlx::query(
        r#"
        select id, alias, dest_index, mapping, attempts
        from reindex_jobs
        where job_status->>'type' = 'queued' and wake_at <= now()
        order by id asc
        for update skip locked
        limit 1
        "#,
    )
    .fetch_optional(&mut **txn)
    .await?;

    row.map(|row| {
        Ok(ReindexJob {
            id: row.try_get("id")?,
            alias: row.try_get("alias")?,
            dest_index: row.try_get("dest_index")?,
            mapping: row.try_get("mapping")?,
            attempts: row.try_get("attempts")?,
        })
    })
    .transpose()
}

/// Record the terminal status of a job.
pub async fn resolve(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &str,
    id: i64,
    status: &serde_json::Value,
) -> sqlx::Result<()> {
    sqlx::query(&format!(
        "update {table} set job_status = $2, updated_at = clock_timestamp() where id = $1",
    ))
    .bind(id)
    .bind(status)
    .execute(&mut **txn)
    .await?;
    Ok(())
}

/// Re-queue a job after a transient failure, with a linear backoff so a
/// persistently failing job doesn't spin the worker loop.
pub async fn retry(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &str,
    id: i64,
) -> sqlx::Result<()> {
    sqlx::query(&format!(
        r#"
        update {table} set
            attempts = attempts + 1,
            wake_at = now() + interval '5 seconds' * (attempts + 1),
            updated_at = clock_timestamp()
        where id = $1
        "#,
    ))
    .bind(id)
    .execute(&mut **txn)
    .await?;
    Ok(())
}
