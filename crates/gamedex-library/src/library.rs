//! Library facade
//!
//! [`GameLibrary`] is the surface the frontend drives. Every method is
//! blocking and meant to run inside a [`TaskSlot`](crate::TaskSlot) worker;
//! the library is cheap to clone into one.

use crate::LibraryError;
use crate::cache::{CacheError, CatalogCache};
use crate::catalog::{Catalog, collect_records};
use crate::deletion::{DeletionEngine, DeletionReport};
use crate::document_tree::{DocumentTreeSource, GrantStore};
use crate::extractor::{CommandExtractor, MetadataExtractor};
use crate::record::{Category, TitleRecord};
use crate::scanner::DirectorySource;
use crate::task::CancelToken;
use gamedex_config::{GamedexConfig, StorageRoots};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct GameLibrary {
    roots: StorageRoots,
    directories: DirectorySource,
    documents: DocumentTreeSource,
    extractor: Arc<dyn MetadataExtractor>,
    cache: CatalogCache,
    deletion: DeletionEngine,
}

impl fmt::Debug for GameLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLibrary")
            .field("roots", &self.roots)
            .field("documents", &self.documents)
            .finish()
    }
}

impl GameLibrary {
    pub fn new(
        roots: StorageRoots,
        extractor: Arc<dyn MetadataExtractor>,
        documents: DocumentTreeSource,
    ) -> Self {
        Self {
            directories: DirectorySource::new(&roots.installed, &roots.disc),
            cache: CatalogCache::new(&roots.catalog_file),
            deletion: DeletionEngine::new(roots.clone()),
            documents,
            extractor,
            roots,
        }
    }

    /// Library using the configured extractor program and the stored tree grant
    pub fn from_config(config: &GamedexConfig) -> Self {
        let roots = config.roots();
        let extractor = CommandExtractor::new(&config.extractor.program)
            .with_args(config.extractor.args.iter().cloned());
        let grant = GrantStore::new(&roots.grant_file).load();
        let documents =
            DocumentTreeSource::from_grant(grant, config.document_tree.image_extension.as_str());

        Self::new(roots, Arc::new(extractor), documents)
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Full scan of both sources, without touching the cache
    pub fn scan(&self, cancel: &CancelToken) -> Result<Catalog, LibraryError> {
        let directory = collect_records(&self.directories, self.extractor.as_ref(), cancel)?;
        let document = collect_records(&self.documents, self.extractor.as_ref(), cancel)?;
        Ok(Catalog::merge(directory, document))
    }

    /// Rescan and replace the cache
    pub fn refresh(&self, cancel: &CancelToken) -> Result<Catalog, LibraryError> {
        if let Err(e) = self.roots.ensure_scan_roots() {
            tracing::warn!("Cannot create scan roots: {}", e);
        }

        let catalog = self.scan(cancel)?;
        if cancel.is_cancelled() {
            tracing::info!("Refresh cancelled, keeping previous cache");
            return Err(LibraryError::Cancelled);
        }
        self.cache.save(&catalog)?;
        tracing::info!("Refreshed catalog: {} titles", catalog.len());
        Ok(catalog)
    }

    /// Catalog from the cache file alone
    pub fn load_cached(&self) -> Result<Catalog, CacheError> {
        self.cache.load()
    }

    /// Startup path: the cached catalog, or a full refresh if it cannot be read
    pub fn load_or_refresh(&self, cancel: &CancelToken) -> Result<Catalog, LibraryError> {
        match self.load_cached() {
            Ok(catalog) => Ok(catalog),
            Err(e) => {
                tracing::warn!("{}, rebuilding catalog", e);
                self.refresh(cancel)
            }
        }
    }

    /// Installed add-on record for a serial, even though the catalog hides it
    pub fn lookup_addon(&self, serial: &str) -> Option<TitleRecord> {
        self.directories
            .lookup(serial, self.extractor.as_ref())
            .filter(|record| record.category.is_addon())
    }

    /// Version of the installed update for a disc title
    pub fn update_version(&self, record: &TitleRecord) -> Option<String> {
        if record.category != Category::DiscGame {
            return None;
        }
        self.lookup_addon(&record.serial).map(|addon| addon.version)
    }

    pub fn is_disc_sourced(&self, record: &TitleRecord) -> bool {
        record.is_disc_sourced(&self.roots.disc)
    }

    pub fn delete_installed(&self, serial: &str) -> DeletionReport {
        self.deletion.delete_installed(serial)
    }

    pub fn delete_save_and_trophy(&self, serial: &str) -> DeletionReport {
        self.deletion.delete_save_and_trophy(serial)
    }

    pub fn delete_all(&self, serial: &str) -> DeletionReport {
        self.deletion.delete_all(serial)
    }

    pub fn delete_shader_cache(&self, serial: &str) -> DeletionReport {
        self.deletion.delete_shader_cache(serial)
    }
}
