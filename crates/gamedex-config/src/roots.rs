//! Resolved storage roots
//!
//! Layout under the data directory follows the emulator's virtual HDD:
//! - `config/dev_hdd0/game` - installed titles, keyed by serial
//! - `config/games` - extracted disc titles
//! - `config/dev_hdd0/home/00000001/{savedata,trophy}` - per-user data, keyed by serial prefix
//! - `cache/cache/<serial>/<generation>/shaders_cache` - shader caches

use crate::StorageConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directory name of shader caches inside a cache generation
pub const SHADER_CACHE_DIR: &str = "shaders_cache";

/// Every location the title index reads or deletes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoots {
    /// Installed titles (one directory per serial)
    pub installed: PathBuf,
    /// Disc titles copied to internal storage
    pub disc: PathBuf,
    /// Save data (entries named `<serial><suffix>`)
    pub savedata: PathBuf,
    /// Trophy data (entries named `<serial><suffix>`)
    pub trophy: PathBuf,
    /// Shader cache root (one directory per serial)
    pub shader_cache: PathBuf,
    /// Persisted catalog
    pub catalog_file: PathBuf,
    /// Persisted scoped document tree grant
    pub grant_file: PathBuf,
}

impl StorageRoots {
    /// Default layout under a data directory
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        let config = data_dir.join("config");
        let home = config.join("dev_hdd0/home/00000001");

        Self {
            installed: config.join("dev_hdd0/game"),
            disc: config.join("games"),
            savedata: home.join("savedata"),
            trophy: home.join("trophy"),
            shader_cache: data_dir.join("cache/cache"),
            catalog_file: config.join("game_list.json"),
            grant_file: config.join("iso_dir.json"),
        }
    }

    /// Resolve roots from configuration, applying per-root overrides
    pub fn from_config(storage: &StorageConfig, grant_file: Option<&Path>) -> Self {
        let mut roots = Self::under(&storage.data_dir);

        if let Some(dir) = &storage.installed_dir {
            roots.installed = dir.clone();
        }
        if let Some(dir) = &storage.disc_dir {
            roots.disc = dir.clone();
        }
        if let Some(dir) = &storage.savedata_dir {
            roots.savedata = dir.clone();
        }
        if let Some(dir) = &storage.trophy_dir {
            roots.trophy = dir.clone();
        }
        if let Some(dir) = &storage.shader_cache_dir {
            roots.shader_cache = dir.clone();
        }
        if let Some(file) = &storage.catalog_file {
            roots.catalog_file = file.clone();
        }
        if let Some(file) = grant_file {
            roots.grant_file = file.to_path_buf();
        }

        roots
    }

    /// Per-title shader cache root
    pub fn title_shader_cache(&self, serial: &str) -> PathBuf {
        self.shader_cache.join(serial)
    }

    /// Installed directory for a serial
    pub fn installed_title(&self, serial: &str) -> PathBuf {
        self.installed.join(serial)
    }

    /// Create the two scan roots if they are missing
    pub fn ensure_scan_roots(&self) -> io::Result<()> {
        for dir in [&self.installed, &self.disc] {
            if !dir.is_dir() {
                fs::create_dir_all(dir)?;
                tracing::debug!("Created scan root {}", dir.display());
            }
        }
        Ok(())
    }
}
