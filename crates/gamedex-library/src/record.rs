//! Title records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Title category
///
/// Decodes from both the catalog names and the raw two-letter descriptor
/// codes an extractor may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Bootable disc title
    #[serde(alias = "DG")]
    DiscGame,
    /// Detached update or add-on data for a disc title
    #[serde(alias = "GD")]
    GameDataAddon,
    /// Title installed to the internal drive
    #[serde(alias = "HG")]
    HddGame,
    /// Non-game application
    #[serde(alias = "AP")]
    Application,
    /// Anything else
    #[serde(other)]
    Unknown,
}

impl Category {
    /// Catalog name of this category
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DiscGame => "disc-game",
            Category::GameDataAddon => "game-data-addon",
            Category::HddGame => "hdd-game",
            Category::Application => "application",
            Category::Unknown => "unknown",
        }
    }

    /// Whether records of this category are hidden from the catalog
    pub fn is_addon(&self) -> bool {
        matches!(self, Category::GameDataAddon)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance<'a> {
    /// Opaque reference to a disc image inside the scoped document tree
    DocumentTree(&'a str),
    /// Directory on the filesystem
    Directory(&'a Path),
    /// Neither field set (hand-built or foreign record)
    Unknown,
}

/// One entry in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRecord {
    pub serial: String,
    pub name: String,
    pub version: String,
    pub category: Category,

    /// Content is usable; undecrypted titles are listed but not launchable
    pub decrypt: bool,

    #[serde(default, with = "icon_base64")]
    pub icon: Option<Vec<u8>>,

    #[serde(default)]
    pub iso_source_reference: Option<String>,

    /// Title directory, always valid UTF-8
    #[serde(default)]
    pub install_path: Option<String>,

    #[serde(default)]
    pub resolution: u32,

    #[serde(default)]
    pub sound_format: u32,
}

impl TitleRecord {
    /// Create a record with no icon and no provenance
    pub fn new(
        serial: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            serial: serial.into(),
            name: name.into(),
            version: version.into(),
            category,
            decrypt: true,
            icon: None,
            iso_source_reference: None,
            install_path: None,
            resolution: 0,
            sound_format: 0,
        }
    }

    /// Provenance of this record; the document tree reference wins if both are set
    pub fn provenance(&self) -> Provenance<'_> {
        match (&self.iso_source_reference, &self.install_path) {
            (Some(reference), _) => Provenance::DocumentTree(reference),
            (None, Some(path)) => Provenance::Directory(Path::new(path)),
            (None, None) => Provenance::Unknown,
        }
    }

    /// Disc-sourced: from the document tree, or installed under `disc_root`
    pub fn is_disc_sourced(&self, disc_root: &Path) -> bool {
        match self.provenance() {
            Provenance::DocumentTree(_) => true,
            Provenance::Directory(path) => path.starts_with(disc_root),
            Provenance::Unknown => false,
        }
    }
}

/// Icon bytes as standard base64 text
mod icon_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(icon: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match icon {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
