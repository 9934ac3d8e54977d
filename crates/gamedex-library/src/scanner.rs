//! Title directory scanning

use crate::extractor::MetadataExtractor;
use crate::record::TitleRecord;
use crate::source::{Candidate, CandidateOrigin, TitleSource};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Descriptor file marking a directory as a title
pub const DESCRIPTOR_FILE: &str = "PARAM.SFO";

/// Subdirectory holding the descriptor on disc layouts
pub const DISC_ROOT_DIR: &str = "PS3_GAME";

/// Icon file next to the descriptor
pub const ICON_FILE: &str = "ICON0.PNG";

/// Scans the installed and disc roots for title directories
#[derive(Debug, Clone)]
pub struct DirectorySource {
    installed_root: PathBuf,
    disc_root: PathBuf,
}

impl DirectorySource {
    /// Create a source over the installed titles root and the disc titles root
    pub fn new(installed_root: impl Into<PathBuf>, disc_root: impl Into<PathBuf>) -> Self {
        Self {
            installed_root: installed_root.into(),
            disc_root: disc_root.into(),
        }
    }

    /// Immediate subdirectories of `root` that hold a descriptor, by name
    pub fn scan_root(root: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Scan root {} does not exist", root.display());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Cannot list {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|path| path.is_dir() && Self::descriptor_path(path).is_some())
            .collect();
        dirs.sort();
        dirs
    }

    /// Location of the descriptor inside a title directory, if present
    pub fn descriptor_path(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(DESCRIPTOR_FILE),
            dir.join(DISC_ROOT_DIR).join(DESCRIPTOR_FILE),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }

    /// Read the title icon from a title directory
    pub fn read_icon(dir: &Path) -> Option<Vec<u8>> {
        let icon = [dir.join(ICON_FILE), dir.join(DISC_ROOT_DIR).join(ICON_FILE)]
            .into_iter()
            .find(|path| path.is_file())?;

        match fs::read(&icon) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Cannot read icon {}: {}", icon.display(), e);
                None
            }
        }
    }

    /// Extract the record of the title installed under `<installed root>/<serial>`
    pub fn lookup(&self, serial: &str, extractor: &dyn MetadataExtractor) -> Option<TitleRecord> {
        let dir = self.installed_root.join(serial);
        if !dir.is_dir() || Self::descriptor_path(&dir).is_none() {
            return None;
        }
        let Some(path) = dir.to_str() else {
            tracing::warn!("Ignoring {}: path is not valid UTF-8", dir.display());
            return None;
        };

        match extractor.extract_dir(&dir) {
            Ok(mut record) => {
                if record.install_path.is_none() {
                    record.install_path = Some(path.to_string());
                }
                Some(record)
            }
            Err(e) => {
                tracing::debug!("No installed record for {}: {}", serial, e);
                None
            }
        }
    }

    pub fn installed_root(&self) -> &Path {
        &self.installed_root
    }

    pub fn disc_root(&self) -> &Path {
        &self.disc_root
    }
}

impl TitleSource for DirectorySource {
    fn label(&self) -> &str {
        "directories"
    }

    fn enumerate(&self) -> Vec<Candidate> {
        let mut dirs = Self::scan_root(&self.installed_root);
        dirs.extend(Self::scan_root(&self.disc_root));
        dirs.into_iter().map(Candidate::directory).collect()
    }

    fn open(&self, candidate: &Candidate) -> io::Result<Box<dyn Read + Send>> {
        let CandidateOrigin::Directory(dir) = &candidate.origin else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a directory candidate",
            ));
        };

        let descriptor = Self::descriptor_path(dir).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {} in {}", DESCRIPTOR_FILE, dir.display()),
            )
        })?;
        Ok(Box::new(File::open(descriptor)?))
    }
}
