//! Persisted catalog
//!
//! The cache is a JSON array of title records, icons base64-encoded. A save
//! replaces the whole file through a sibling temporary file, so a reader
//! never observes a partially written catalog.

use crate::catalog::Catalog;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Catalog cache not found: {0}")]
    Missing(PathBuf),

    #[error("Cannot read catalog cache: {0}")]
    Read(#[source] io::Error),

    #[error("Malformed catalog cache: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Cannot write catalog cache: {0}")]
    Write(#[source] io::Error),
}

/// Catalog cache file
#[derive(Debug, Clone)]
pub struct CatalogCache {
    path: PathBuf,
}

impl CatalogCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached catalog
    pub fn load(&self) -> Result<Catalog, CacheError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CacheError::Missing(self.path.clone())
            } else {
                CacheError::Read(e)
            }
        })?;

        let catalog: Catalog = serde_json::from_str(&contents)?;
        tracing::debug!(
            "Loaded {} titles from {}",
            catalog.len(),
            self.path.display()
        );
        Ok(catalog)
    }

    /// Replace the cache with `catalog`
    pub fn save(&self, catalog: &Catalog) -> Result<(), CacheError> {
        let contents =
            serde_json::to_string(catalog).map_err(|e| CacheError::Write(io::Error::other(e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(CacheError::Write)?;
        }

        let staging = self.staging_path();
        fs::write(&staging, contents).map_err(CacheError::Write)?;

        if let Err(e) = self.clear() {
            fs::remove_file(&staging).ok();
            return Err(CacheError::Write(e));
        }
        fs::rename(&staging, &self.path).map_err(CacheError::Write)?;

        tracing::info!("Cached {} titles to {}", catalog.len(), self.path.display());
        Ok(())
    }

    /// Delete the cache file if present
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
