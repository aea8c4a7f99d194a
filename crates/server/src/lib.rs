//! The document-store service: the Coordinator façade over the relational
//! and search stores, the durable job handlers of the indexing pipeline,
//! and the HTTP API.

pub mod api;
pub mod coordinator;
mod error;
pub mod handlers;
pub mod indexing;
pub mod registry;
pub mod reindex;

pub use coordinator::Coordinator;
pub use error::Error;
pub use handlers::{serve, HandleResult, Handler};
pub use indexing::IndexHandler;
pub use registry::Registry;
pub use reindex::ReindexHandler;
