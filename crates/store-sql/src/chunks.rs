use bytes::Bytes;
use futures::Stream;
use models::Id;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

// Parts fetched per round trip while streaming a body back out.
const READ_BATCH: i64 = 16;

/// Idempotent DDL of the shared chunk table. Chunks of every namespace share
/// one table keyed by `(id, part)`.
pub async fn ensure_table(pool: &PgPool) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        create table if not exists json_chunks (
            id uuid not null,
            part integer not null,
            data bytea not null,
            primary key (id, part)
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Batch-insert pending `(part, data)` rows of one document.
pub async fn insert_batch(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Id,
    parts: &[i32],
    datas: &[Vec<u8>],
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        insert into json_chunks (id, part, data)
        select $1::uuid, u.part, u.data
        from unnest($2::int4[], $3::bytea[]) as u(part, data)
        "#,
    )
    .bind(id.as_uuid())
    .bind(parts)
    .bind(datas)
    .execute(&mut **txn)
    .await?;
    Ok(())
}

/// A lazy, single-pass, non-restartable stream of a document's chunks in
/// `part` order. Parts are read in keyset-paginated batches so the full body
/// is never materialised on this side.
pub fn iter_chunks(pool: &PgPool, id: Id) -> impl Stream<Item = sqlx::Result<Bytes>> + 'static {
    struct State {
        pool: PgPool,
        id: Uuid,
        next_part: i32,
        batch: std::collections::VecDeque<Bytes>,
        done: bool,
    }

    let state = State {
        pool: pool.clone(),
        id: id.as_uuid(),
        next_part: 0,
        batch: std::collections::VecDeque::new(),
        done: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.batch.pop_front() {
                return Ok(Some((chunk, state)));
            }
            if state.done {
                return Ok(None);
            }

            let rows = sqlx::query(
                r#"
                select part, data
                from json_chunks
                where id = $1 and part >= $2
                order by part asc
                limit $3
                "#,
            )
            .bind(state.id)
            .bind(state.next_part)
            .bind(READ_BATCH)
            .fetch_all(&state.pool)
            .await?;

            if (rows.len() as i64) < READ_BATCH {
                state.done = true;
            }
            for row in rows {
                state.next_part = row.try_get::<i32, _>("part")? + 1;
                state.batch.push_back(Bytes::from(row.try_get::<Vec<u8>, _>("data")?));
            }
        }
    })
}

/// Delete all chunks of a document, returning the number removed.
pub async fn delete(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Id,
) -> sqlx::Result<u64> {
    let result = sqlx::query("delete from json_chunks where id = $1")
        .bind(id.as_uuid())
        .execute(&mut **txn)
        .await?;
    Ok(result.rows_affected())
}

/// Delete all chunks of a document outside of any surrounding transaction.
pub async fn delete_all(pool: &PgPool, id: Id) -> sqlx::Result<u64> {
    let result = sqlx::query("delete from json_chunks where id = $1")
        .bind(id.as_uuid())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Number of chunk rows held for a document.
pub async fn count(pool: &PgPool, id: Id) -> sqlx::Result<i64> {
    sqlx::query_scalar("select count(*) from json_chunks where id = $1")
        .bind(id.as_uuid())
        .fetch_one(pool)
        .await
}
