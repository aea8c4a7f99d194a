//! Integration coverage of the search-engine contract. These tests require a
//! running Elasticsearch and are ignored by default:
//!
//!   ELASTIC_SEARCH__DSN=http://localhost:9200 \
//!     cargo test -p search-store -- --ignored

use models::{Id, ReindexOptions};
use search_store::{EvolveOutcome, SearchStore};
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

fn connect() -> SearchStore {
    let dsn = std::env::var("ELASTIC_SEARCH__DSN")
        .unwrap_or_else(|_| "http://localhost:9200".to_string());
    SearchStore::new(&dsn).expect("constructing search store")
}

fn scratch_namespace() -> String {
    format!("es_test_{}", Uuid::new_v4().simple())
}

fn keyword_mapping(fields: &[&str]) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    for field in fields {
        properties.insert(field.to_string(), json!({"type": "keyword"}));
    }
    json!({"mappings": {"properties": properties}})
}

async fn cleanup(store: &SearchStore, namespace: &str) {
    for index in store.alias_targets(namespace).await.unwrap_or_default() {
        store.delete_index(&index).await.ok();
    }
    store
        .delete_index(&search_store::bootstrap_index_name(namespace))
        .await
        .ok();
}

#[tokio::test]
#[ignore = "requires a running Elasticsearch"]
#[serial]
async fn document_ops_round_trip() {
    let store = connect();
    let namespace = scratch_namespace();

    search_store::ensure_namespace(
        &store,
        &namespace,
        &json!({"mappings": {"dynamic": true, "properties": {}}}),
    )
    .await
    .unwrap();
    // Ensuring twice is a no-op.
    search_store::ensure_namespace(
        &store,
        &namespace,
        &json!({"mappings": {"dynamic": true, "properties": {}}}),
    )
    .await
    .unwrap();

    let id = Id::generate();
    let document = json!({"k": "v", "n": 3});

    assert!(store
        .insert_document(&namespace, id, &document)
        .await
        .unwrap());
    assert_eq!(
        store.get_document(&namespace, id).await.unwrap(),
        Some(document.clone()),
    );

    let hits = store
        .search(&namespace, &json!({"query": {"term": {"k": "v"}}}), 10, 0)
        .await
        .unwrap();
    assert_eq!(hits, vec![document]);

    assert!(store.delete_document(&namespace, id).await.unwrap());
    assert!(!store.delete_document(&namespace, id).await.unwrap());
    assert_eq!(store.get_document(&namespace, id).await.unwrap(), None);

    cleanup(&store, &namespace).await;
}

#[tokio::test]
#[ignore = "requires a running Elasticsearch"]
#[serial]
async fn absent_namespace_reads_as_absent() {
    let store = connect();
    let namespace = scratch_namespace();
    let id = Id::generate();

    assert_eq!(store.get_document(&namespace, id).await.unwrap(), None);
    assert!(!store.delete_document(&namespace, id).await.unwrap());
    assert!(store.alias_targets(&namespace).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running Elasticsearch"]
#[serial]
async fn schema_change_swaps_alias_and_keeps_documents() {
    let store = connect();
    let namespace = scratch_namespace();

    // First schema: a fresh namespace gets its index and alias directly.
    let outcome =
        search_store::create_or_update_index(&store, &namespace, &keyword_mapping(&["status"]))
            .await
            .unwrap();
    assert_eq!(outcome, EvolveOutcome::Created);

    let first_targets = store.alias_targets(&namespace).await.unwrap();
    assert_eq!(first_targets.len(), 1);

    let id = Id::generate();
    let document = json!({"status": "paid", "region": "emea"});
    assert!(store
        .insert_document(&namespace, id, &document)
        .await
        .unwrap());

    // Second schema adds a field and must reindex through a fresh index.
    let mapping = keyword_mapping(&["status", "region"]);
    let outcome = search_store::create_or_update_index(&store, &namespace, &mapping)
        .await
        .unwrap();
    let EvolveOutcome::ReindexRequired { dest_index } = outcome else {
        panic!("an existing namespace must require a reindex");
    };

    search_store::finish_reindex(
        &store,
        &namespace,
        &dest_index,
        &mapping,
        ReindexOptions::default(),
    )
    .await
    .unwrap();

    // The alias points at exactly the new index, the old index is gone, and
    // the document is queryable over the newly mapped field.
    let targets = store.alias_targets(&namespace).await.unwrap();
    assert_eq!(targets, vec![dest_index.clone()]);
    assert!(!store.index_exists(&first_targets[0]).await.unwrap());

    assert_eq!(
        store.get_document(&namespace, id).await.unwrap(),
        Some(document.clone()),
    );
    let hits = store
        .search(
            &namespace,
            &json!({"query": {"term": {"region": "emea"}}}),
            10,
            0,
        )
        .await
        .unwrap();
    assert_eq!(hits, vec![document]);

    cleanup(&store, &namespace).await;
}
