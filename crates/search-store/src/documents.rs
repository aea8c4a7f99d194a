use models::Id;
use serde_json::Value;

use crate::{Error, SearchStore};

#[derive(serde::Deserialize)]
struct WriteResponse {
    result: String,
}

#[derive(serde::Deserialize)]
struct GetResponse {
    #[serde(rename = "_source")]
    source: Value,
}

#[derive(serde::Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(serde::Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(serde::Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: Value,
}

impl SearchStore {
    /// Upsert a document. `refresh=wait_for` blocks until the document is
    /// queryable, so a successful return is immediately observable.
    pub async fn insert_document(
        &self,
        namespace: &str,
        id: Id,
        document: &Value,
    ) -> Result<bool, Error> {
        let path = format!("/{namespace}/_doc/{id}?refresh=wait_for");
        let response = self
            .http
            .put(self.url(&path)?)
            .json(document)
            .send()
            .await?;
        let response = Self::check("PUT", &path, response).await?;

        let written: WriteResponse = response.json().await?;
        Ok(matches!(written.result.as_str(), "created" | "updated"))
    }

    /// The indexed source of a document, or None when it is absent
    /// (including when the namespace has no index yet).
    pub async fn get_document(&self, namespace: &str, id: Id) -> Result<Option<Value>, Error> {
        let path = format!("/{namespace}/_doc/{id}");
        let response = self.http.get(self.url(&path)?).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check("GET", &path, response).await?;

        let found: GetResponse = response.json().await?;
        Ok(Some(found.source))
    }

    /// Remove a document, returning true iff it existed.
    pub async fn delete_document(&self, namespace: &str, id: Id) -> Result<bool, Error> {
        let path = format!("/{namespace}/_doc/{id}?refresh=wait_for");
        let response = self.http.delete(self.url(&path)?).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = Self::check("DELETE", &path, response).await?;

        let deleted: WriteResponse = response.json().await?;
        Ok(deleted.result == "deleted")
    }

    /// Run a compiled query against a namespace, flattening the engine's
    /// hits to their source documents.
    pub async fn search(
        &self,
        namespace: &str,
        body: &Value,
        size: i64,
        from: i64,
    ) -> Result<Vec<Value>, Error> {
        let path = format!("/{namespace}/_search?size={size}&from={from}");
        let response = self.http.post(self.url(&path)?).json(body).send().await?;
        let response = Self::check("POST", &path, response).await?;

        let results: SearchResponse = response.json().await?;
        Ok(results.hits.hits.into_iter().map(|hit| hit.source).collect())
    }
}
