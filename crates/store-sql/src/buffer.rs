use models::Id;
use sqlx::postgres::PgPool;

/// Idempotent DDL of the staging buffer holding full bodies of small,
/// non-streamed documents.
pub async fn ensure_table(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        create table if not exists json_buffer (
            id uuid primary key,
            content bytea not null
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Id,
    content: &[u8],
) -> sqlx::Result<()> {
    sqlx::query("insert into json_buffer (id, content) values ($1, $2)")
        .bind(id.as_uuid())
        .bind(content)
        .execute(&mut **txn)
        .await?;
    Ok(())
}

/// The staged body of a document, or None when it was never staged
/// (streamed documents live in the chunk table instead).
pub async fn fetch(pool: &PgPool, id: Id) -> sqlx::Result<Option<Vec<u8>>> {
    sqlx::query_scalar("select content from json_buffer where id = $1")
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await
}

pub async fn delete(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Id,
) -> sqlx::Result<bool> {
    let result = sqlx::query("delete from json_buffer where id = $1")
        .bind(id.as_uuid())
        .execute(&mut **txn)
        .await?;
    Ok(result.rows_affected() > 0)
}
