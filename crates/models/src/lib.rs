mod document;
mod id;
mod names;
mod options;

pub use document::{Document, DocumentList};
pub use id::Id;
pub use names::{InvalidNamespace, Namespace};
pub use options::{Conflicts, IngestOptions, ListOptions, ReindexOptions};
