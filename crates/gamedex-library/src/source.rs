//! Uniform view over title storage backends
//!
//! Plain directories and the scoped document tree both enumerate
//! [`Candidate`]s; the scan pipeline resolves each one into extractor input
//! without knowing which backend produced it.

use crate::document_tree::DocumentHandle;
use std::io::{self, Read};
use std::path::PathBuf;

/// How a candidate is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOrigin {
    /// A title directory reachable by path
    Directory(PathBuf),
    /// A disc image reachable only through its document tree handle
    Document(DocumentHandle),
}

/// A possible title found by a source, not yet extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub origin: CandidateOrigin,
    /// Name shown in logs and passed to the extractor for documents
    pub display_name: String,
}

impl Candidate {
    pub fn directory(path: PathBuf) -> Self {
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            origin: CandidateOrigin::Directory(path),
            display_name,
        }
    }

    pub fn document(handle: DocumentHandle, display_name: impl Into<String>) -> Self {
        Self {
            origin: CandidateOrigin::Document(handle),
            display_name: display_name.into(),
        }
    }
}

/// A storage backend that can enumerate and open title candidates
pub trait TitleSource: Send + Sync {
    /// Short name for logs
    fn label(&self) -> &str;

    /// List candidates; an absent or revoked backend yields an empty list
    fn enumerate(&self) -> Vec<Candidate>;

    /// Open a candidate's content as a byte stream
    fn open(&self, candidate: &Candidate) -> io::Result<Box<dyn Read + Send>>;
}
