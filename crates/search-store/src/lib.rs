//! Thin contract over the search engine's HTTP API: index and alias
//! management, document operations, search, and the alias-backed reindex
//! primitive behind zero-downtime schema evolution.

mod documents;
mod evolve;
mod indices;

pub use evolve::{
    bootstrap_index_name, create_or_update_index, ensure_namespace, finish_reindex,
    physical_index_name, EvolveOutcome,
};

use std::time::Duration;

/// Error is the discriminated result of talking to the search engine.
/// Absence (a missing document or alias) is not an error: those read as
/// `None` / `false` / empty from the individual operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid search engine DSN {0:?}")]
    BadDsn(String),
    #[error("search engine request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search engine returned {status} for {method} {path}: {body}")]
    Api {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
    #[error("reindex of {source_index} into {dest} reported failures: {failures}")]
    ReindexFailures {
        source_index: String,
        dest: String,
        failures: String,
    },
}

/// SearchStore is a handle on one search engine, addressed by its DSN.
/// Namespaces are addressed through their alias; the engine resolves the
/// alias to the single backing physical index.
#[derive(Debug, Clone)]
pub struct SearchStore {
    http: reqwest::Client,
    base: url::Url,
}

impl SearchStore {
    pub fn new(dsn: &str) -> Result<Self, Error> {
        let base = url::Url::parse(dsn).map_err(|_| Error::BadDsn(dsn.to_string()))?;
        // Reindex runs block until completion, so only connecting is bounded.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base })
    }

    pub(crate) fn url(&self, path: &str) -> Result<url::Url, Error> {
        self.base
            .join(path)
            .map_err(|_| Error::BadDsn(format!("{}{path}", self.base)))
    }

    /// Surface any non-success response as an API error carrying its body.
    pub(crate) async fn check(
        method: &'static str,
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            method,
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}
