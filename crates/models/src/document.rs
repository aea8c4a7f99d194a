use chrono::{DateTime, Utc};

use crate::Id;

/// Document is the metadata record of one stored document.
/// The raw body lives in the chunk table until indexing completes, after
/// which the search index holds the only copy.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Id,
    pub document_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub content_length: i64,
    pub content_hash: String,
}

/// DocumentList is one page of a namespace listing, newest first,
/// along with the total number of documents in the namespace.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentList {
    pub items: Vec<Document>,
    pub count: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_serializes_camel_case() {
        let doc = Document {
            id: "0190f1a2-7c13-7000-8000-000000000000".parse().unwrap(),
            document_name: "invoice".to_string(),
            created_at: "2025-01-02T03:04:05Z".parse().unwrap(),
            updated_at: "2025-01-02T03:04:05Z".parse().unwrap(),
            content_length: 42,
            content_hash: "abc123".to_string(),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "0190f1a2-7c13-7000-8000-000000000000",
                "documentName": "invoice",
                "createdAt": "2025-01-02T03:04:05Z",
                "updatedAt": "2025-01-02T03:04:05Z",
                "contentLength": 42,
                "contentHash": "abc123",
            })
        );
    }
}
