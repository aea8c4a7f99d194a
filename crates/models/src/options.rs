use crate::Id;

/// Options of a streaming ingest.
#[derive(Debug, Copy, Clone)]
pub struct IngestOptions {
    /// Pending chunk rows are flushed to the database whenever their total
    /// size reaches this bound.
    pub max_batch_bytes: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_batch_bytes: 256 * 1024,
        }
    }
}

/// Options of a namespace listing.
#[derive(Debug, Copy, Clone)]
pub struct ListOptions {
    pub limit: i64,
    pub offset: i64,
    /// Upper-bound id: only documents with `id` strictly below the cursor are
    /// returned, so passing the last id of a page yields the strictly-older
    /// remainder.
    pub cursor: Option<Id>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            cursor: None,
        }
    }
}

/// Conflict handling of a reindex run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Conflicts {
    Proceed,
    Abort,
}

/// Options of a reindex run.
#[derive(Debug, Copy, Clone)]
pub struct ReindexOptions {
    pub wait_for_completion: bool,
    pub conflicts: Conflicts,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            wait_for_completion: true,
            conflicts: Conflicts::Proceed,
        }
    }
}
