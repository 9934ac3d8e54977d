//! Configuration sections

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage locations
///
/// Every root defaults to a fixed location under `data_dir`; the optional
/// fields override a single root without moving the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Emulator data directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Installed titles root override
    #[serde(default)]
    pub installed_dir: Option<PathBuf>,

    /// Disc titles root override
    #[serde(default)]
    pub disc_dir: Option<PathBuf>,

    /// Save data root override
    #[serde(default)]
    pub savedata_dir: Option<PathBuf>,

    /// Trophy data root override
    #[serde(default)]
    pub trophy_dir: Option<PathBuf>,

    /// Shader cache root override
    #[serde(default)]
    pub shader_cache_dir: Option<PathBuf>,

    /// Catalog cache file override
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/gamedex")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            installed_dir: None,
            disc_dir: None,
            savedata_dir: None,
            trophy_dir: None,
            shader_cache_dir: None,
            catalog_file: None,
        }
    }
}

/// External metadata extractor invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Extractor executable
    #[serde(default = "default_extractor_program")]
    pub program: PathBuf,

    /// Arguments placed before the mode argument
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_extractor_program() -> PathBuf {
    PathBuf::from("gamedex-extract")
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_extractor_program(),
            args: Vec::new(),
        }
    }
}

/// Scoped document tree scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTreeConfig {
    /// Disc image extension, without the dot
    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Grant record override
    #[serde(default)]
    pub grant_file: Option<PathBuf>,
}

fn default_image_extension() -> String {
    "iso".to_string()
}

impl Default for DocumentTreeConfig {
    fn default() -> Self {
        Self {
            image_extension: default_image_extension(),
            grant_file: None,
        }
    }
}
