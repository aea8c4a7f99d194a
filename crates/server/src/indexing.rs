use futures::StreamExt;
use models::Namespace;
use search_store::SearchStore;
use serde_json::json;
use store_sql::jobs::{self, IndexJob, INDEX_JOBS_TABLE};

use crate::{HandleResult, Handler};

// Transient failures (the database or search engine being away) retry up to
// this many attempts.
const MAX_TRANSIENT_ATTEMPTS: i32 = 10;
// A malformed body is deterministic: one more attempt, then stop.
const MAX_MALFORMED_ATTEMPTS: i32 = 2;

/// IndexHandler drains the `indexDocument` queue: it assembles a document's
/// chunks, parses them, inserts the document into the search store, and
/// collects the chunks on success.
pub struct IndexHandler {
    search: SearchStore,
}

impl IndexHandler {
    pub fn new(search: SearchStore) -> Self {
        Self { search }
    }
}

enum TaskError {
    Transient(anyhow::Error),
    Malformed(String),
}

impl TaskError {
    fn transient(err: impl Into<anyhow::Error>) -> Self {
        TaskError::Transient(err.into())
    }
}

#[async_trait::async_trait]
impl Handler for IndexHandler {
    async fn handle(&mut self, pg_pool: &sqlx::PgPool) -> anyhow::Result<HandleResult> {
        let mut txn = pg_pool.begin().await?;
        let Some(job) = jobs::dequeue_index(&mut txn).await? else {
            return Ok(HandleResult::NoJobs);
        };

        match index_document(pg_pool, &self.search, &mut txn, &job).await {
            Ok(()) => {
                jobs::resolve(&mut txn, INDEX_JOBS_TABLE, job.id, &json!({"type": "success"}))
                    .await?;
                tracing::info!(namespace = %job.namespace, id = %job.document_id, "indexed document");
            }
            Err(TaskError::Transient(err)) if job.attempts + 1 < MAX_TRANSIENT_ATTEMPTS => {
                tracing::warn!(
                    namespace = %job.namespace,
                    id = %job.document_id,
                    attempts = job.attempts,
                    error = ?err,
                    "indexing failed, will retry"
                );
                jobs::retry(&mut txn, INDEX_JOBS_TABLE, job.id).await?;
            }
            Err(TaskError::Malformed(reason)) if job.attempts + 1 < MAX_MALFORMED_ATTEMPTS => {
                tracing::warn!(
                    namespace = %job.namespace,
                    id = %job.document_id,
                    %reason,
                    "document looks malformed, one more attempt"
                );
                jobs::retry(&mut txn, INDEX_JOBS_TABLE, job.id).await?;
            }
            Err(err) => {
                let reason = match err {
                    TaskError::Transient(err) => format!("{err:#}"),
                    TaskError::Malformed(reason) => reason,
                };
                tracing::error!(
                    namespace = %job.namespace,
                    id = %job.document_id,
                    %reason,
                    "indexing failed permanently"
                );
                jobs::resolve(
                    &mut txn,
                    INDEX_JOBS_TABLE,
                    job.id,
                    &json!({"type": "failed", "error": reason}),
                )
                .await?;
            }
        }

        txn.commit().await?;
        Ok(HandleResult::HadJob)
    }

    fn table_name(&self) -> &'static str {
        INDEX_JOBS_TABLE
    }
}

/// One attempt at indexing a document. Safe under retry: the insert is an
/// upsert by id, and a document deleted before its task ran reads as done.
async fn index_document(
    pool: &sqlx::PgPool,
    search: &SearchStore,
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    job: &IndexJob,
) -> Result<(), TaskError> {
    let namespace = Namespace::new(job.namespace.clone())
        .map_err(|err| TaskError::Malformed(err.to_string()))?;

    // The document was deleted before indexing ran: nothing to do.
    let meta = store_sql::documents::get_meta(pool, &namespace, job.document_id)
        .await
        .map_err(TaskError::transient)?;
    if meta.is_none() {
        return Ok(());
    }

    search_store::ensure_namespace(search, &namespace, &search_lang::default_mapping())
        .await
        .map_err(TaskError::transient)?;

    let mut body = Vec::new();
    let mut chunk_stream = std::pin::pin!(store_sql::chunks::iter_chunks(pool, job.document_id));
    while let Some(chunk) = chunk_stream.next().await {
        body.extend_from_slice(&chunk.map_err(TaskError::transient)?);
    }
    if body.is_empty() {
        // Small documents are staged whole rather than chunked.
        if let Some(staged) = store_sql::buffer::fetch(pool, job.document_id)
            .await
            .map_err(TaskError::transient)?
        {
            body = staged;
        }
    }
    if body.is_empty() {
        // No bytes anywhere: an earlier attempt already inserted the document
        // and collected its chunks, or the body is simply gone.
        let indexed = search
            .get_document(&namespace, job.document_id)
            .await
            .map_err(TaskError::transient)?;
        if indexed.is_some() {
            return Ok(());
        }
        return Err(TaskError::Malformed(
            "no body bytes found for document".to_string(),
        ));
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|err| TaskError::Malformed(format!("document body is not valid JSON: {err}")))?;
    if !payload.is_object() {
        return Err(TaskError::Malformed(
            "only JSON objects can be indexed".to_string(),
        ));
    }

    let inserted = search
        .insert_document(&namespace, job.document_id, &payload)
        .await
        .map_err(TaskError::transient)?;
    if inserted {
        store_sql::chunks::delete(txn, job.document_id)
            .await
            .map_err(TaskError::transient)?;
        store_sql::buffer::delete(txn, job.document_id)
            .await
            .map_err(TaskError::transient)?;
    }

    Ok(())
}
