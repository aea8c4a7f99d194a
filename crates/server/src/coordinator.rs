use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use futures::Stream;
use models::{Document, DocumentList, Id, IngestOptions, ListOptions, Namespace};
use search_store::{EvolveOutcome, SearchStore};

use crate::{Error, Registry};

/// Coordinator is the service façade. It sequences namespace bootstrap,
/// ingestion, deletion fan-out, schema updates and search across its
/// constructor-injected collaborators, and owns the namespace registry.
#[derive(Clone)]
pub struct Coordinator {
    pool: sqlx::PgPool,
    search: SearchStore,
    registry: Arc<Registry>,
    ingest: IngestOptions,
}

impl Coordinator {
    pub fn new(
        pool: sqlx::PgPool,
        search: SearchStore,
        registry: Arc<Registry>,
        ingest: IngestOptions,
    ) -> Self {
        Self {
            pool,
            search,
            registry,
            ingest,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// First-use bootstrap of a namespace: shared tables, the namespace's
    /// metadata table, and the registry entry.
    async fn bootstrap_namespace(&self, namespace: &Namespace) -> Result<(), Error> {
        if !self.registry.insert_namespace(namespace) {
            return Ok(());
        }
        store_sql::chunks::ensure_table(&self.pool).await?;
        store_sql::buffer::ensure_table(&self.pool).await?;
        store_sql::documents::ensure_meta_table(&self.pool, namespace).await?;
        tracing::info!(%namespace, "bootstrapped namespace");
        Ok(())
    }

    /// Stream a document body into the namespace and enqueue its indexing.
    /// The returned id is immediately valid for metadata reads; the document
    /// becomes searchable once the indexing task drains.
    pub async fn create_object_stream<S, E>(
        &self,
        namespace: &Namespace,
        document_name: &str,
        body: S,
    ) -> Result<Id, Error>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.bootstrap_namespace(namespace).await?;

        let doc = store_sql::ingest::create_document_stream(
            &self.pool,
            namespace,
            document_name,
            body,
            self.ingest,
        )
        .await
        .map_err(Error::Internal)?;

        store_sql::jobs::enqueue_index(&self.pool, namespace, doc.id).await?;
        tracing::debug!(%namespace, id = %doc.id, "enqueued document for indexing");

        Ok(doc.id)
    }

    pub async fn get_object_meta(
        &self,
        namespace: &Namespace,
        id: Id,
    ) -> Result<Document, Error> {
        store_sql::documents::get_meta(&self.pool, namespace, id)
            .await?
            .ok_or(Error::NotFound)
    }

    /// The indexed body of a document. Clients observe the single,
    /// schema-normalised view: until indexing completes this is InProgress.
    pub async fn get_object_body(
        &self,
        namespace: &Namespace,
        id: Id,
    ) -> Result<serde_json::Value, Error> {
        self.get_object_meta(namespace, id).await?;

        self.search
            .get_document(namespace, id)
            .await?
            .ok_or(Error::InProgress)
    }

    /// Fan-out delete: the relational rows and the indexed document are
    /// removed concurrently, and both removals must complete.
    pub async fn delete_object(&self, namespace: &Namespace, id: Id) -> Result<(), Error> {
        let (store, search) = tokio::join!(
            store_sql::delete_object(&self.pool, namespace, id),
            self.search.delete_document(namespace, id),
        );
        store?;
        search?;
        Ok(())
    }

    /// Store a search schema and apply its mapping to the namespace's index.
    /// An existing index is evolved through the asynchronous reindex task;
    /// overlapping schema updates are rejected with a conflict.
    pub async fn set_search_schema(
        &self,
        namespace: &Namespace,
        schema: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let mapping = search_lang::schema_to_mapping(&schema)?;

        match search_store::create_or_update_index(&self.search, namespace, &mapping).await? {
            EvolveOutcome::Created => (),
            EvolveOutcome::ReindexRequired { dest_index } => {
                if !self.registry.begin_reindex(namespace) {
                    return Err(Error::Conflict(namespace.to_string()));
                }
                if let Err(err) =
                    store_sql::jobs::enqueue_reindex(&self.pool, namespace, &dest_index, &mapping)
                        .await
                {
                    self.registry.end_reindex(namespace);
                    return Err(err.into());
                }
                tracing::info!(%namespace, %dest_index, "enqueued namespace reindex");
            }
        }

        self.registry.set_schema(namespace, schema);
        Ok(())
    }

    /// Compile a filter expression against the namespace's schema and run it.
    pub async fn search_objects(
        &self,
        namespace: &Namespace,
        filters: &str,
    ) -> Result<Vec<serde_json::Value>, Error> {
        if self.registry.schema(namespace).is_none() {
            return Err(Error::BadRequest("search schema not set".to_string()));
        }
        let query = search_lang::compile_filter(filters)?;

        Ok(self.search.search(namespace, &query, 10, 0).await?)
    }

    pub async fn read_namespace(&self, namespace: &Namespace) -> Result<DocumentList, Error> {
        Ok(store_sql::documents::list_meta(&self.pool, namespace, ListOptions::default()).await?)
    }

    pub async fn list_objects(
        &self,
        namespace: &Namespace,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<DocumentList, Error> {
        let cursor = cursor
            .map(|raw| {
                raw.parse::<Id>()
                    .with_context(|| format!("invalid cursor {raw:?}"))
                    .map_err(|err| Error::BadRequest(format!("{err:#}")))
            })
            .transpose()?;

        Ok(store_sql::documents::list_meta(
            &self.pool,
            namespace,
            ListOptions {
                limit,
                offset: 0,
                cursor,
            },
        )
        .await?)
    }

    /// All namespaces bootstrapped by this process, sorted by name.
    pub async fn namespaces(&self) -> Vec<String> {
        self.registry.namespaces()
    }
}
