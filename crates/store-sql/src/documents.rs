use chrono::{DateTime, Utc};
use models::{Document, DocumentList, Id, ListOptions, Namespace};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::is_undefined_table;

/// Idempotent DDL of a namespace's metadata table. The namespace is
/// interpolated into the statement, which is safe only because `Namespace`
/// is restricted to a bare identifier.
pub async fn ensure_meta_table(pool: &PgPool, namespace: &Namespace) -> sqlx::Result<()> {
    sqlx::query(&format!(
        r#"
        create table if not exists {} (
            id uuid primary key,
            document_name text not null,
            content_length integer not null,
            content_hash text not null,
            created_at timestamptz not null default now(),
            updated_at timestamptz not null default now()
        );
        "#,
        namespace.meta_table(),
    ))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn drop_meta_table(pool: &PgPool, namespace: &Namespace) -> sqlx::Result<()> {
    sqlx::query(&format!(
        "drop table if exists {}",
        namespace.meta_table()
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert the metadata row of a freshly written document, returning its
/// database-assigned timestamps.
pub async fn insert_meta(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    namespace: &Namespace,
    id: Id,
    document_name: &str,
    content_length: i32,
    content_hash: &str,
) -> sqlx::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let row = sqlx::query(&format!(
        r#"
        insert into {} (id, document_name, content_length, content_hash)
        values ($1, $2, $3, $4)
        returning created_at, updated_at
        "#,
        namespace.meta_table(),
    ))
    .bind(id.as_uuid())
    .bind(document_name)
    .bind(content_length)
    .bind(content_hash)
    .fetch_one(&mut **txn)
    .await?;

    Ok((row.try_get("created_at")?, row.try_get("updated_at")?))
}

pub async fn get_meta(
    pool: &PgPool,
    namespace: &Namespace,
    id: Id,
) -> sqlx::Result<Option<Document>> {
    let fetched = sqlx::query(&format!(
        r#"
        select id, document_name, content_length, content_hash, created_at, updated_at
        from {}
        where id = $1
        "#,
        namespace.meta_table(),
    ))
    .bind(id.as_uuid())
    .fetch_optional(pool)
    .await;

    match fetched {
        Ok(Some(row)) => Ok(Some(document_from_row(&row)?)),
        Ok(None) => Ok(None),
        Err(err) if is_undefined_table(&err) => Ok(None),
        Err(err) => Err(err),
    }
}

pub async fn delete_meta(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    namespace: &Namespace,
    id: Id,
) -> sqlx::Result<bool> {
    let result = sqlx::query(&format!(
        "delete from {} where id = $1",
        namespace.meta_table(),
    ))
    .bind(id.as_uuid())
    .execute(&mut **txn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// One page of a namespace's documents, newest first, along with the total
/// count. Ids are time-ordered, so ordering by id is creation order with a
/// deterministic tiebreak, and it is the same key the cursor bounds: the
/// cursor is a strict upper-bound id, and repeating a listing with the last
/// returned id yields strictly older documents with none skipped.
pub async fn list_meta(
    pool: &PgPool,
    namespace: &Namespace,
    options: ListOptions,
) -> sqlx::Result<DocumentList> {
    let table = namespace.meta_table();

    let mut conn = pool.acquire().await?;

    let select = match options.cursor {
        Some(_) => format!(
            r#"
            select id, document_name, content_length, content_hash, created_at, updated_at
            from {table}
            where id < $3
            order by id desc
            limit $1 offset $2
            "#,
        ),
        None => format!(
            r#"
            select id, document_name, content_length, content_hash, created_at, updated_at
            from {table}
            order by id desc
            limit $1 offset $2
            "#,
        ),
    };

    let mut query = sqlx::query(&select).bind(options.limit).bind(options.offset);
    if let Some(cursor) = options.cursor {
        query = query.bind(cursor.as_uuid());
    }

    let rows = match query.fetch_all(&mut *conn).await {
        Ok(rows) => rows,
        Err(err) if is_undefined_table(&err) => return Ok(DocumentList::default()),
        Err(err) => return Err(err),
    };

    let items = rows
        .iter()
        .map(document_from_row)
        .collect::<sqlx::Result<Vec<_>>>()?;

    let count: i64 = sqlx::query_scalar(&format!("select count(*) from {table}"))
        .fetch_one(&mut *conn)
        .await?;

    Ok(DocumentList { items, count })
}

fn document_from_row(row: &PgRow) -> sqlx::Result<Document> {
    Ok(Document {
        id: Id::from(row.try_get::<Uuid, _>("id")?),
        document_name: row.try_get("document_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        content_length: i64::from(row.try_get::<i32, _>("content_length")?),
        content_hash: row.try_get("content_hash")?,
    })
}
