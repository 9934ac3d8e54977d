//! Configuration for the gamedex title index
//!
//! Handles the TOML configuration file and resolves the storage roots the
//! library scans and deletes from.

mod roots;
mod sections;

pub use roots::{SHADER_CACHE_DIR, StorageRoots};
pub use sections::{DocumentTreeConfig, ExtractorConfig, StorageConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// System-wide configuration file
pub const SYSTEM_CONFIG_FILE: &str = "/etc/gamedex/config.toml";

/// User configuration file, relative to the data directory
pub const USER_CONFIG_FILE: &str = "config/gamedex.toml";

/// Main gamedex configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GamedexConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub document_tree: DocumentTreeConfig,
}

impl GamedexConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load the system configuration overlaid with the user configuration
    ///
    /// The user file lives under the data directory named by the system file
    /// (or the default data directory).
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_layered(Path::new(SYSTEM_CONFIG_FILE))
    }

    /// Load `system` overlaid with the user file it points at
    pub fn load_layered(system: &Path) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::Table(toml::value::Table::new());
        let mut found = false;

        if system.exists() {
            merge_toml(&mut merged, read_toml(system)?);
            found = true;
        }

        let data_dir: Self = merged.clone().try_into()?;
        let user = data_dir.storage.data_dir.join(USER_CONFIG_FILE);
        if user.exists() {
            merge_toml(&mut merged, read_toml(&user)?);
            found = true;
        }

        if !found {
            tracing::warn!("No configuration file found, using defaults");
        }

        Ok(merged.try_into()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Storage roots resolved from this configuration
    pub fn roots(&self) -> StorageRoots {
        StorageRoots::from_config(&self.storage, self.document_tree.grant_file.as_deref())
    }
}

fn read_toml(path: &Path) -> Result<toml::Value, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Merge `overlay` into `base`, recursing through tables
pub fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                if let Some(base_value) = base_table.get_mut(&key) {
                    merge_toml(base_value, value);
                } else {
                    base_table.insert(key, value);
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config() {
        let config = GamedexConfig::default();
        assert_eq!(config.document_tree.image_extension, "iso");
        assert_eq!(config.roots(), StorageRoots::under("/var/lib/gamedex"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
[storage]
data_dir = "/srv/emu"

[extractor]
program = "/usr/bin/sfo-dump"
args = ["--json"]
"#;
        write!(temp_file, "{}", config_content).unwrap();

        let config = GamedexConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/emu"));
        assert_eq!(config.extractor.program, PathBuf::from("/usr/bin/sfo-dump"));
        assert_eq!(config.document_tree.image_extension, "iso");
    }

    #[test]
    fn test_load_missing_file() {
        let err = GamedexConfig::load(Path::new("/nonexistent/gamedex.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(format!("{}", err).contains("not found"));
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/gamedex.toml");
        let mut config = GamedexConfig::default();
        config.storage.data_dir = temp.path().to_path_buf();

        config.save(&path).unwrap();

        let loaded = GamedexConfig::load(&path).unwrap();
        assert_eq!(loaded.storage.data_dir, temp.path());
    }

    #[test]
    fn test_layered_user_overrides_system() {
        let temp = TempDir::new().unwrap();
        let system = temp.path().join("system.toml");
        std::fs::write(
            &system,
            format!(
                "[storage]\ndata_dir = {:?}\n\n[extractor]\nprogram = \"/opt/extract\"\n",
                temp.path().to_string_lossy()
            ),
        )
        .unwrap();

        let user = temp.path().join(USER_CONFIG_FILE);
        std::fs::create_dir_all(user.parent().unwrap()).unwrap();
        std::fs::write(&user, "[document_tree]\nimage_extension = \"ISO\"\n").unwrap();

        let config = GamedexConfig::load_layered(&system).unwrap();
        assert_eq!(config.storage.data_dir, temp.path());
        assert_eq!(config.extractor.program, PathBuf::from("/opt/extract"));
        assert_eq!(config.document_tree.image_extension, "ISO");
    }

    #[test]
    fn test_layered_without_files_uses_defaults() {
        let config = GamedexConfig::load_layered(Path::new("/nonexistent/system.toml")).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/gamedex"));
    }

    #[test]
    fn test_merge_toml_tables() {
        let base_table = toml::toml! {
            [storage]
            data_dir = "/a"
            disc_dir = "/a/discs"
        };
        let mut base = toml::Value::Table(base_table);

        let overlay_table = toml::toml! {
            [storage]
            data_dir = "/b"
        };

        merge_toml(&mut base, toml::Value::Table(overlay_table));

        let storage = base.get("storage").unwrap().as_table().unwrap();
        assert_eq!(storage.get("data_dir").unwrap().as_str(), Some("/b"));
        assert_eq!(storage.get("disc_dir").unwrap().as_str(), Some("/a/discs"));
    }
}
