//! Scoped document tree access
//!
//! A document tree is a permission-gated view over an external storage
//! location. Entries are addressed by opaque [`DocumentHandle`]s rather than
//! paths, and a grant that was revoked or whose location disappeared reads
//! as an absent tree.

use crate::source::{Candidate, CandidateOrigin, TitleSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque reference to one document inside a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentHandle(String);

impl DocumentHandle {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A direct child of a document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub handle: DocumentHandle,
    pub name: String,
    pub is_file: bool,
}

/// Access to a granted document tree
pub trait DocumentTree: Send + Sync {
    /// Whether the tree is still reachable
    fn exists(&self) -> bool;

    /// Direct children of the tree root
    fn list_children(&self) -> io::Result<Vec<DocumentEntry>>;

    /// Open a document for reading by handle
    fn open(&self, handle: &DocumentHandle) -> io::Result<Box<dyn Read + Send>>;
}

/// Persisted permission to read a document tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeGrant {
    /// Opaque tree reference, the prefix of every handle in the tree
    pub tree_uri: String,
    /// Location backing the tree
    pub root: PathBuf,
}

impl TreeGrant {
    /// Grant access to a local directory
    pub fn for_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            tree_uri: format!("tree:{}", root.display()),
            root,
        }
    }
}

/// Stores the single process-wide tree grant
#[derive(Debug, Clone)]
pub struct GrantStore {
    path: PathBuf,
}

impl GrantStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the stored grant; missing or unreadable records read as no grant
    pub fn load(&self) -> Option<TreeGrant> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Cannot read tree grant {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(grant) => Some(grant),
            Err(e) => {
                tracing::warn!("Ignoring malformed tree grant {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Replace the stored grant
    pub fn save(&self, grant: &TreeGrant) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(grant).map_err(io::Error::other)?;
        fs::write(&self.path, contents)?;
        tracing::info!("Granted document tree {}", grant.tree_uri);
        Ok(())
    }

    /// Forget the stored grant
    pub fn revoke(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("Revoked document tree grant");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Document tree backed by a granted local directory
///
/// Handles are `<tree uri>/document/<name>` and only resolve to direct
/// children of the granted root.
#[derive(Debug, Clone)]
pub struct LocalDocumentTree {
    grant: TreeGrant,
}

impl LocalDocumentTree {
    pub fn new(grant: TreeGrant) -> Self {
        Self { grant }
    }

    fn handle_for(&self, name: &str) -> DocumentHandle {
        DocumentHandle(format!("{}/document/{}", self.grant.tree_uri, name))
    }

    fn resolve(&self, handle: &DocumentHandle) -> io::Result<PathBuf> {
        let prefix = format!("{}/document/", self.grant.tree_uri);
        let name = handle
            .as_str()
            .strip_prefix(&prefix)
            .filter(|name| is_plain_name(name))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("handle {} is outside the granted tree", handle),
                )
            })?;
        Ok(self.grant.root.join(name))
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\')
}

impl DocumentTree for LocalDocumentTree {
    fn exists(&self) -> bool {
        self.grant.root.is_dir()
    }

    fn list_children(&self) -> io::Result<Vec<DocumentEntry>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(&self.grant.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            children.push(DocumentEntry {
                handle: self.handle_for(&name),
                is_file: entry.file_type()?.is_file(),
                name,
            });
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    fn open(&self, handle: &DocumentHandle) -> io::Result<Box<dyn Read + Send>> {
        let path = self.resolve(handle)?;
        Ok(Box::new(File::open(path)?))
    }
}

/// Enumerates disc images at the top level of the granted tree
#[derive(Clone)]
pub struct DocumentTreeSource {
    tree: Option<Arc<dyn DocumentTree>>,
    extension: String,
}

impl DocumentTreeSource {
    /// `extension` is matched case-sensitively, without the dot
    pub fn new(tree: Option<Arc<dyn DocumentTree>>, extension: impl Into<String>) -> Self {
        Self {
            tree,
            extension: extension.into(),
        }
    }

    /// Source over a stored grant backed by a local directory
    pub fn from_grant(grant: Option<TreeGrant>, extension: impl Into<String>) -> Self {
        let tree = grant.map(|g| Arc::new(LocalDocumentTree::new(g)) as Arc<dyn DocumentTree>);
        Self::new(tree, extension)
    }

    pub fn is_configured(&self) -> bool {
        self.tree.is_some()
    }

    fn matches(&self, name: &str) -> bool {
        name.strip_suffix(self.extension.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|stem| !stem.is_empty())
    }
}

impl fmt::Debug for DocumentTreeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentTreeSource")
            .field("configured", &self.tree.is_some())
            .field("extension", &self.extension)
            .finish()
    }
}

impl TitleSource for DocumentTreeSource {
    fn label(&self) -> &str {
        "document tree"
    }

    fn enumerate(&self) -> Vec<Candidate> {
        let Some(tree) = &self.tree else {
            tracing::debug!("No document tree granted");
            return Vec::new();
        };

        if !tree.exists() {
            tracing::warn!("Granted document tree is no longer available");
            return Vec::new();
        }

        let children = match tree.list_children() {
            Ok(children) => children,
            Err(e) => {
                tracing::warn!("Cannot list document tree: {}", e);
                return Vec::new();
            }
        };

        children
            .into_iter()
            .filter(|entry| entry.is_file && self.matches(&entry.name))
            .map(|entry| Candidate::document(entry.handle, entry.name))
            .collect()
    }

    fn open(&self, candidate: &Candidate) -> io::Result<Box<dyn Read + Send>> {
        let CandidateOrigin::Document(handle) = &candidate.origin else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a document candidate",
            ));
        };
        let tree = self
            .tree
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no document tree granted"))?;
        tree.open(handle)
    }
}

/// Check that a grant's location exists before storing it
pub fn validate_grant_root(root: &Path) -> io::Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ))
    }
}
