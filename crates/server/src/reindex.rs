use std::sync::Arc;

use models::ReindexOptions;
use search_store::SearchStore;
use serde_json::json;
use store_sql::jobs::{self, REINDEX_JOBS_TABLE};

use crate::{HandleResult, Handler, Registry};

const MAX_ATTEMPTS: i32 = 10;

/// ReindexHandler drains the `reindexNamespace` queue, running the alias-swap
/// protocol for one namespace at a time and releasing the namespace's
/// reindex-in-progress flag when the job reaches a terminal state.
pub struct ReindexHandler {
    search: SearchStore,
    registry: Arc<Registry>,
}

impl ReindexHandler {
    pub fn new(search: SearchStore, registry: Arc<Registry>) -> Self {
        Self { search, registry }
    }
}

#[async_trait::async_trait]
impl Handler for ReindexHandler {
    async fn handle(&mut self, pg_pool: &sqlx::PgPool) -> anyhow::Result<HandleResult> {
        let mut txn = pg_pool.begin().await?;
        let Some(job) = jobs::dequeue_reindex(&mut txn).await? else {
            return Ok(HandleResult::NoJobs);
        };

        let result = search_store::finish_reindex(
            &self.search,
            &job.alias,
            &job.dest_index,
            &job.mapping,
            ReindexOptions::default(),
        )
        .await;

        match result {
            Ok(()) => {
                jobs::resolve(&mut txn, REINDEX_JOBS_TABLE, job.id, &json!({"type": "success"}))
                    .await?;
                self.registry.end_reindex(&job.alias);
                tracing::info!(alias = %job.alias, dest_index = %job.dest_index, "reindexed namespace");
            }
            // Per-document failures are not transient: the destination has
            // been dropped, the alias is untouched, and old data remains
            // queryable.
            Err(err @ search_store::Error::ReindexFailures { .. }) => {
                jobs::resolve(
                    &mut txn,
                    REINDEX_JOBS_TABLE,
                    job.id,
                    &json!({"type": "failed", "error": err.to_string()}),
                )
                .await?;
                self.registry.end_reindex(&job.alias);
                tracing::error!(alias = %job.alias, error = %err, "reindex failed");
            }
            Err(err) if job.attempts + 1 < MAX_ATTEMPTS => {
                // The flag stays held: the reindex is still in progress.
                tracing::warn!(
                    alias = %job.alias,
                    attempts = job.attempts,
                    error = %err,
                    "reindex failed, will retry"
                );
                jobs::retry(&mut txn, REINDEX_JOBS_TABLE, job.id).await?;
            }
            Err(err) => {
                jobs::resolve(
                    &mut txn,
                    REINDEX_JOBS_TABLE,
                    job.id,
                    &json!({"type": "failed", "error": err.to_string()}),
                )
                .await?;
                self.registry.end_reindex(&job.alias);
                tracing::error!(alias = %job.alias, error = %err, "reindex failed permanently");
            }
        }

        txn.commit().await?;
        Ok(HandleResult::HadJob)
    }

    fn table_name(&self) -> &'static str {
        REINDEX_JOBS_TABLE
    }
}
