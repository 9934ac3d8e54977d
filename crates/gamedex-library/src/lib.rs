//! Local game library index
//!
//! Discovers installed titles in plain directories and in a scoped document
//! tree, extracts their records through an external extractor, and keeps the
//! merged catalog in a JSON cache. Also removes a title's installed data,
//! save and trophy data, and shader caches.
//!
//! Long-running work goes through a [`TaskSlot`], which runs one operation
//! at a time on a worker thread.

mod cache;
mod catalog;
mod deletion;
mod document_tree;
mod extractor;
mod library;
mod record;
mod scanner;
mod source;
mod task;

pub use cache::{CacheError, CatalogCache};
pub use catalog::{Catalog, collect_records};
pub use deletion::{DeletionEngine, DeletionReport, remove_tree};
pub use document_tree::{
    DocumentEntry, DocumentHandle, DocumentTree, DocumentTreeSource, GrantStore,
    LocalDocumentTree, TreeGrant, validate_grant_root,
};
pub use extractor::{CommandExtractor, ExtractError, MetadataExtractor};
pub use library::GameLibrary;
pub use record::{Category, Provenance, TitleRecord};
pub use scanner::{DESCRIPTOR_FILE, DISC_ROOT_DIR, DirectorySource, ICON_FILE};
pub use source::{Candidate, CandidateOrigin, TitleSource};
pub use task::{CancelToken, TaskError, TaskEvent, TaskSlot, TaskState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Worker thread exited without a result")]
    WorkerLost,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_error_display() {
        let err = LibraryError::Cancelled;
        assert_eq!(format!("{}", err), "Operation cancelled");

        let err = LibraryError::from(CacheError::Missing("/tmp/game_list.json".into()));
        assert_eq!(
            format!("{}", err),
            "Catalog cache not found: /tmp/game_list.json"
        );
    }
}
