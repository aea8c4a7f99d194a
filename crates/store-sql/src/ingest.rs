use anyhow::Context;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use models::{Document, Id, IngestOptions, Namespace};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPool;

use crate::{buffer, chunks, documents};

/// Consume a lazy byte stream into the chunk table and write the document's
/// metadata row, all inside one transaction. The body is never materialised:
/// chunks are buffered up to `max_batch_bytes` and flushed in batches, with a
/// running SHA-256 and length. Any failure, including one raised by the body
/// producer, rolls back every chunk and the metadata row together.
#[tracing::instrument(err, level = "debug", skip(pool, body, options))]
pub async fn create_document_stream<S, E>(
    pool: &PgPool,
    namespace: &Namespace,
    document_name: &str,
    body: S,
    options: IngestOptions,
) -> anyhow::Result<Document>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let id = Id::generate();
    let mut txn = pool.begin().await.context("beginning ingest transaction")?;

    let mut hasher = Sha256::new();
    let mut content_length: u64 = 0;
    let mut next_part: i32 = 0;

    let mut pending_parts: Vec<i32> = Vec::new();
    let mut pending_datas: Vec<Vec<u8>> = Vec::new();
    let mut pending_bytes: usize = 0;

    let mut body = std::pin::pin!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.context("reading request body")?;
        // Empty chunks are skipped without consuming a part number.
        if chunk.is_empty() {
            continue;
        }

        hasher.update(&chunk);
        content_length += chunk.len() as u64;

        pending_bytes += chunk.len();
        pending_parts.push(next_part);
        pending_datas.push(chunk.to_vec());
        next_part += 1;

        if pending_bytes >= options.max_batch_bytes {
            chunks::insert_batch(&mut txn, id, &pending_parts, &pending_datas)
                .await
                .context("flushing chunk batch")?;
            pending_parts.clear();
            pending_datas.clear();
            pending_bytes = 0;
        }
    }

    if !pending_parts.is_empty() {
        chunks::insert_batch(&mut txn, id, &pending_parts, &pending_datas)
            .await
            .context("flushing final chunk batch")?;
    }

    let content_length: i32 = content_length
        .try_into()
        .context("document body exceeds the metadata length range")?;
    let content_hash = format!("{:x}", hasher.finalize());

    let (created_at, updated_at) = documents::insert_meta(
        &mut txn,
        namespace,
        id,
        document_name,
        content_length,
        &content_hash,
    )
    .await
    .context("inserting document metadata")?;

    txn.commit().await.context("committing ingest transaction")?;

    Ok(Document {
        id,
        document_name: document_name.to_string(),
        created_at,
        updated_at,
        content_length: i64::from(content_length),
        content_hash,
    })
}

/// Non-streaming fast path: serialise the payload to compact JSON and stage
/// the whole body in the buffer table alongside its metadata row.
pub async fn create_document(
    pool: &PgPool,
    namespace: &Namespace,
    document_name: &str,
    payload: &serde_json::Value,
) -> anyhow::Result<Document> {
    let raw = serde_json::to_vec(payload).context("serialising payload")?;
    let content_length: i32 = raw
        .len()
        .try_into()
        .context("payload exceeds the metadata length range")?;
    let content_hash = format!("{:x}", Sha256::digest(&raw));
    let id = Id::generate();

    let mut txn = pool.begin().await.context("beginning ingest transaction")?;
    let (created_at, updated_at) = documents::insert_meta(
        &mut txn,
        namespace,
        id,
        document_name,
        content_length,
        &content_hash,
    )
    .await
    .context("inserting document metadata")?;
    buffer::insert(&mut txn, id, &raw)
        .await
        .context("staging document body")?;
    txn.commit().await.context("committing ingest transaction")?;

    Ok(Document {
        id,
        document_name: document_name.to_string(),
        created_at,
        updated_at,
        content_length: i64::from(content_length),
        content_hash,
    })
}
