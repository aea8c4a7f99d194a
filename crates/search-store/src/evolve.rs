//! The index evolution protocol: every namespace alias points at exactly one
//! physical index, and schema changes materialise a new physical index which
//! takes over the alias in a single atomic swap.

use models::ReindexOptions;
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, SearchStore};

/// Name of a schema-driven physical index backing `namespace`.
pub fn physical_index_name(namespace: &str) -> String {
    format!("{namespace}_{}", Uuid::new_v4())
}

/// Name of the physical index created on first use, before any schema is
/// set. The name is deterministic so that racing bootstrap attempts collide
/// on the engine's create rather than double-aliasing the namespace.
pub fn bootstrap_index_name(namespace: &str) -> String {
    format!("{namespace}_bootstrap")
}

/// What `create_or_update_index` decided.
#[derive(Debug, PartialEq, Eq)]
pub enum EvolveOutcome {
    /// The namespace had no index: one was created and aliased with the
    /// requested mapping. No reindex is needed.
    Created,
    /// The namespace already has a backing index. A fresh physical index
    /// name was chosen; the caller must run the reindex task against it.
    ReindexRequired { dest_index: String },
}

/// Apply a new mapping to a namespace. Fresh namespaces get their index and
/// alias immediately; existing ones require the (asynchronous) reindex task,
/// which creates the destination index itself so that retries are safe.
pub async fn create_or_update_index(
    store: &SearchStore,
    namespace: &str,
    mapping: &Value,
) -> Result<EvolveOutcome, Error> {
    if store.index_exists(namespace).await? {
        return Ok(EvolveOutcome::ReindexRequired {
            dest_index: physical_index_name(namespace),
        });
    }

    let physical = physical_index_name(namespace);
    store
        .create_index(&physical, mapping, Some(namespace))
        .await?;
    Ok(EvolveOutcome::Created)
}

/// Make sure the namespace alias resolves to some index, creating the
/// bootstrap index when it doesn't. Concurrent callers are safe: the
/// bootstrap name is fixed, so the engine rejects the loser's create.
pub async fn ensure_namespace(
    store: &SearchStore,
    namespace: &str,
    default_mapping: &Value,
) -> Result<(), Error> {
    if store.index_exists(namespace).await? {
        return Ok(());
    }

    let bootstrap = bootstrap_index_name(namespace);
    match store
        .create_index(&bootstrap, default_mapping, Some(namespace))
        .await
    {
        Ok(()) => Ok(()),
        Err(Error::Api { body, .. }) if body.contains("resource_already_exists_exception") => {
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// The body of the `reindexNamespace` task: copy the alias' current index
/// into `dest_index`, atomically retarget the alias, and collect the old
/// physical indexes. On any failure the destination is removed and the alias
/// left untouched, so old data stays queryable.
pub async fn finish_reindex(
    store: &SearchStore,
    alias: &str,
    dest_index: &str,
    mapping: &Value,
    options: ReindexOptions,
) -> Result<(), Error> {
    if !store.index_exists(dest_index).await? {
        store.create_index(dest_index, mapping, None).await?;
    }

    let old_indexes = store.alias_targets(alias).await?;

    if let Err(err) = store.reindex(alias, dest_index, options).await {
        if let Err(cleanup) = store.delete_index(dest_index).await {
            tracing::warn!(%dest_index, error = %cleanup, "failed to remove dead reindex target");
        }
        return Err(err);
    }

    store.swap_alias(alias, &old_indexes, dest_index).await?;

    // The alias has moved; old physical indexes are garbage. Removing them is
    // best-effort.
    for index in &old_indexes {
        if index == dest_index {
            continue;
        }
        if let Err(err) = store.delete_index(index).await {
            tracing::warn!(%index, error = %err, "failed to remove superseded index");
        }
    }

    Ok(())
}
