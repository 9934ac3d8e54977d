//! Title data removal
//!
//! All removals are best-effort: each entry is attempted, failures are
//! logged and counted, and one failure never stops the remaining entries.

use gamedex_config::{SHADER_CACHE_DIR, StorageRoots};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of a deletion, for logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Targets that no longer exist
    pub removed: Vec<PathBuf>,
    /// Entries that could not be removed
    pub failed: Vec<PathBuf>,
}

impl DeletionReport {
    /// No entry failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn absorb(&mut self, other: DeletionReport) {
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }
}

/// Remove `path` and everything below it, depth-first
///
/// Files go before their directories. Symbolic links are removed, never
/// followed. A missing `path` is not a failure.
pub fn remove_tree(path: &Path, report: &mut DeletionReport) {
    if let Err(e) = fs::symlink_metadata(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Cannot stat {}: {}", path.display(), e);
            report.failed.push(path.to_path_buf());
        }
        return;
    }

    let walker = WalkDir::new(path)
        .follow_links(false)
        .follow_root_links(false)
        .contents_first(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Cannot walk {}: {}", path.display(), e);
                if let Some(failed) = e.path() {
                    report.failed.push(failed.to_path_buf());
                }
                continue;
            }
        };

        let result = if entry.file_type().is_dir() {
            fs::remove_dir(entry.path())
        } else {
            fs::remove_file(entry.path())
        };

        match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Cannot remove {}: {}", entry.path().display(), e);
                report.failed.push(entry.path().to_path_buf());
            }
        }
    }

    if fs::symlink_metadata(path).is_err() {
        tracing::debug!("Removed {}", path.display());
        report.removed.push(path.to_path_buf());
    }
}

/// Serials name directories directly; anything that could walk out of a
/// root, or match every entry by prefix, is refused.
fn is_valid_serial(serial: &str) -> bool {
    !serial.is_empty()
        && serial != "."
        && serial != ".."
        && !serial.contains(|c: char| c == '/' || c == '\\')
}

/// Removes installed titles and their data from the storage roots
#[derive(Debug, Clone)]
pub struct DeletionEngine {
    roots: StorageRoots,
}

impl DeletionEngine {
    pub fn new(roots: StorageRoots) -> Self {
        Self { roots }
    }

    /// Remove every installed directory whose name starts with `serial`
    ///
    /// Catches install data stored under suffixed directory names as well.
    pub fn delete_installed(&self, serial: &str) -> DeletionReport {
        if !is_valid_serial(serial) {
            tracing::warn!("Refusing to delete installed data for serial {:?}", serial);
            return DeletionReport::default();
        }

        let report = Self::remove_prefixed(&self.roots.installed, serial);
        tracing::info!(
            "Deleted installed data of {} ({} entries, {} failures)",
            serial,
            report.removed.len(),
            report.failed.len()
        );
        report
    }

    /// Remove every save data and trophy entry whose name starts with `serial`
    pub fn delete_save_and_trophy(&self, serial: &str) -> DeletionReport {
        let mut report = DeletionReport::default();
        if !is_valid_serial(serial) {
            tracing::warn!("Refusing to delete save data for serial {:?}", serial);
            return report;
        }

        for root in [&self.roots.savedata, &self.roots.trophy] {
            report.absorb(Self::remove_prefixed(root, serial));
        }
        tracing::info!(
            "Deleted save and trophy data of {} ({} entries, {} failures)",
            serial,
            report.removed.len(),
            report.failed.len()
        );
        report
    }

    /// Remove save and trophy data, then `<installed root>/<serial>` only
    pub fn delete_all(&self, serial: &str) -> DeletionReport {
        let mut report = self.delete_save_and_trophy(serial);
        if !is_valid_serial(serial) {
            return report;
        }

        remove_tree(&self.roots.installed_title(serial), &mut report);
        tracing::info!(
            "Deleted {} and its data ({} failures)",
            serial,
            report.failed.len()
        );
        report
    }

    /// Remove the shader cache of every cache generation of a title
    pub fn delete_shader_cache(&self, serial: &str) -> DeletionReport {
        let mut report = DeletionReport::default();
        if !is_valid_serial(serial) {
            tracing::warn!("Refusing to delete shader cache for serial {:?}", serial);
            return report;
        }

        let title_root = self.roots.title_shader_cache(serial);
        let generations = match fs::read_dir(&title_root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Cannot list {}: {}", title_root.display(), e);
                }
                return report;
            }
        };

        for generation in generations.filter_map(|e| e.ok()) {
            let shaders = generation.path().join(SHADER_CACHE_DIR);
            remove_tree(&shaders, &mut report);
        }
        tracing::info!(
            "Deleted {} shader caches of {}",
            report.removed.len(),
            serial
        );
        report
    }

    fn remove_prefixed(root: &Path, prefix: &str) -> DeletionReport {
        let mut report = DeletionReport::default();
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("Cannot list {}: {}", root.display(), e);
                }
                return report;
            }
        };

        for entry in entries.filter_map(|e| e.ok()) {
            if entry.file_name().to_string_lossy().starts_with(prefix) {
                remove_tree(&entry.path(), &mut report);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(path: &Path) {
        fs::create_dir_all(path.join("nested/deeper")).unwrap();
        fs::write(path.join("top.bin"), b"top").unwrap();
        fs::write(path.join("nested/mid.bin"), b"mid").unwrap();
        fs::write(path.join("nested/deeper/low.bin"), b"low").unwrap();
    }

    #[test]
    fn test_remove_tree() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        populate(&target);

        let mut report = DeletionReport::default();
        remove_tree(&target, &mut report);

        assert!(!target.exists());
        assert_eq!(report.removed, vec![target]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_remove_single_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("BLUS30001-SAVE");
        fs::write(&file, b"save").unwrap();

        let mut report = DeletionReport::default();
        remove_tree(&file, &mut report);
        assert!(!file.exists());
        assert_eq!(report.removed.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_quiet() {
        let temp = TempDir::new().unwrap();
        let mut report = DeletionReport::default();
        remove_tree(&temp.path().join("gone"), &mut report);
        assert_eq!(report, DeletionReport::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside");
        populate(&outside);

        let target = temp.path().join("target");
        fs::create_dir_all(&target).unwrap();
        std::os::unix::fs::symlink(&outside, target.join("link")).unwrap();

        let mut report = DeletionReport::default();
        remove_tree(&target, &mut report);

        assert!(!target.exists());
        assert!(outside.join("nested/deeper/low.bin").exists());
        assert!(report.is_clean());
    }

    /// Make `dir` read-only; false when the process can still write to it
    #[cfg(unix)]
    fn lock_dir(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
        let check = dir.join(".write-check");
        if fs::write(&check, b"").is_ok() {
            fs::remove_file(&check).ok();
            return false;
        }
        true
    }

    #[cfg(unix)]
    fn unlock_dir(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_locked_entry_does_not_stop_siblings() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        let locked = target.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("inner.bin"), b"inner").unwrap();
        fs::write(target.join("a.bin"), b"a").unwrap();
        fs::write(target.join("z.bin"), b"z").unwrap();
        populate(&target.join("sibling"));

        if !lock_dir(&locked) {
            // Permission bits are not enforced (running as root)
            unlock_dir(&locked);
            return;
        }

        let mut report = DeletionReport::default();
        remove_tree(&target, &mut report);
        unlock_dir(&locked);

        assert!(report.failed.contains(&locked.join("inner.bin")));
        assert!(report.removed.is_empty());
        assert!(locked.join("inner.bin").exists());
        assert!(!target.join("a.bin").exists());
        assert!(!target.join("z.bin").exists());
        assert!(!target.join("sibling").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_locked_save_entry_does_not_stop_others() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::under(temp.path());
        let locked = roots.savedata.join("BLUS30001-A");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("DATA.BIN"), b"x").unwrap();
        populate(&roots.savedata.join("BLUS30001-B"));
        fs::create_dir_all(roots.trophy.join("BLUS30001_T")).unwrap();

        if !lock_dir(&locked) {
            unlock_dir(&locked);
            return;
        }

        let report = DeletionEngine::new(roots.clone()).delete_save_and_trophy("BLUS30001");
        unlock_dir(&locked);

        assert!(!report.is_clean());
        assert!(locked.exists());
        assert!(!roots.savedata.join("BLUS30001-B").exists());
        assert!(!roots.trophy.join("BLUS30001_T").exists());
        assert_eq!(report.removed.len(), 2);
    }

    #[test]
    fn test_delete_installed_matches_prefix() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::under(temp.path());
        populate(&roots.installed.join("NPUB30001"));
        populate(&roots.installed.join("NPUB30001DLC"));
        populate(&roots.installed.join("NPUB30002"));

        let report = DeletionEngine::new(roots.clone()).delete_installed("NPUB30001");

        assert_eq!(report.removed.len(), 2);
        assert!(!roots.installed.join("NPUB30001").exists());
        assert!(!roots.installed.join("NPUB30001DLC").exists());
        assert!(roots.installed.join("NPUB30002").exists());
    }

    #[test]
    fn test_delete_all_installed_is_exact() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::under(temp.path());
        populate(&roots.installed.join("NPUB30001"));
        populate(&roots.installed.join("NPUB30001DLC"));
        fs::create_dir_all(roots.savedata.join("NPUB30001-0")).unwrap();

        let report = DeletionEngine::new(roots.clone()).delete_all("NPUB30001");

        assert!(report.is_clean());
        assert!(!roots.installed.join("NPUB30001").exists());
        assert!(!roots.savedata.join("NPUB30001-0").exists());
        assert!(roots.installed.join("NPUB30001DLC").exists());
    }

    #[test]
    fn test_invalid_serials_are_refused() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::under(temp.path());
        fs::create_dir_all(&roots.savedata).unwrap();
        fs::write(roots.savedata.join("BLUS30001-A"), b"save").unwrap();
        fs::create_dir_all(&roots.installed).unwrap();

        let engine = DeletionEngine::new(roots.clone());
        for serial in ["", ".", "..", "../game", "a/b"] {
            assert_eq!(engine.delete_all(serial), DeletionReport::default());
        }

        assert!(roots.savedata.join("BLUS30001-A").exists());
        assert!(roots.installed.exists());
    }

    #[test]
    fn test_shader_cache_generations() {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::under(temp.path());
        let title = roots.title_shader_cache("BLUS30001");
        for generation in ["v1", "v2"] {
            populate(&title.join(generation).join(SHADER_CACHE_DIR));
            fs::write(title.join(generation).join("pipeline.bin"), b"keep").unwrap();
        }
        fs::create_dir_all(title.join("v3")).unwrap();

        let report = DeletionEngine::new(roots).delete_shader_cache("BLUS30001");

        assert_eq!(report.removed.len(), 2);
        for generation in ["v1", "v2"] {
            assert!(!title.join(generation).join(SHADER_CACHE_DIR).exists());
            assert!(title.join(generation).join("pipeline.bin").exists());
        }
        assert!(title.join("v3").exists());
    }

    #[test]
    fn test_shader_cache_missing_title() {
        let temp = TempDir::new().unwrap();
        let engine = DeletionEngine::new(StorageRoots::under(temp.path()));
        let report = engine.delete_shader_cache("NONE00000");
        assert_eq!(report, DeletionReport::default());
    }
}
