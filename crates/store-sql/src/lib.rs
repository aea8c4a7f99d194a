//! The relational substrate of the document store: per-namespace metadata
//! tables, the shared chunk table, the staging buffer for small payloads,
//! and the durable job tables behind the indexing pipeline.

pub mod buffer;
pub mod chunks;
pub mod documents;
pub mod ingest;
pub mod jobs;

use models::{Id, Namespace};

/// True when `err` is Postgres' undefined-table error. A namespace whose
/// metadata table was never created reads as absent rather than failing.
pub(crate) fn is_undefined_table(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "42P01")
}

/// Delete a document's metadata row, chunks, and staged body in one
/// transaction. Returns true iff the metadata row existed and was deleted;
/// chunks may legitimately be gone already once indexing has collected them.
#[tracing::instrument(err, level = "debug", skip(pool))]
pub async fn delete_object(
    pool: &sqlx::PgPool,
    namespace: &Namespace,
    id: Id,
) -> sqlx::Result<bool> {
    let mut txn = pool.begin().await?;

    let deleted = match documents::delete_meta(&mut txn, namespace, id).await {
        Ok(deleted) => deleted,
        Err(err) if is_undefined_table(&err) => {
            txn.rollback().await.ok();
            return Ok(false);
        }
        Err(err) => return Err(err),
    };
    chunks::delete(&mut txn, id).await?;
    buffer::delete(&mut txn, id).await?;
    txn.commit().await?;

    Ok(deleted)
}
