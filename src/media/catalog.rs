//! Folder-backed media catalog

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use super::MediaEntry;

/// One directory entry as reported by a lister
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: OsString,
    pub is_directory: bool,
}

/// Directory listing collaborator
pub trait DirectoryLister: Send + Sync {
    /// List the entries of `dir`, or fail if it cannot be opened
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>>;
}

/// Lists directories through `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDirectoryLister;

impl DirectoryLister for FsDirectoryLister {
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)?.flatten() {
            // Symlinks count as whatever they point at.
            let is_directory = entry.path().is_dir();
            entries.push(DirEntryInfo {
                name: entry.file_name(),
                is_directory,
            });
        }
        Ok(entries)
    }
}

struct CatalogState {
    directory: Option<PathBuf>,
    entries: Arc<[MediaEntry]>,
    populated: bool,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            directory: None,
            entries: Arc::from(Vec::new()),
            populated: false,
        }
    }
}

/// Current set of eligible media files for one folder.
///
/// `list` hands out the snapshot taken by the last `refresh`; a refresh
/// replaces it wholesale and never mutates a snapshot already handed out.
pub struct MediaCatalog {
    lister: Box<dyn DirectoryLister>,
    state: RwLock<CatalogState>,
}

impl MediaCatalog {
    pub fn new() -> Self {
        Self::with_lister(FsDirectoryLister)
    }

    pub fn with_lister(lister: impl DirectoryLister + 'static) -> Self {
        Self {
            lister: Box::new(lister),
            state: RwLock::new(CatalogState::default()),
        }
    }

    /// Rescan `directory`, returning the number of eligible files.
    ///
    /// An empty path clears the catalog. An unreadable folder is logged
    /// and also leaves the catalog empty.
    pub fn refresh(&self, directory: &Path) -> usize {
        let entries = if directory.as_os_str().is_empty() {
            Vec::new()
        } else {
            match self.lister.list(directory) {
                Ok(listing) => collect_media(directory, listing),
                Err(e) => {
                    warn!("Cannot open media folder {:?}: {}", directory, e);
                    Vec::new()
                }
            }
        };

        let count = entries.len();
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.directory = Some(directory.to_path_buf());
            state.entries = entries.into();
            state.populated = true;
        }

        if !directory.as_os_str().is_empty() {
            info!("{} media files found in {:?}", count, directory);
        }
        count
    }

    /// Snapshot of the eligible files, stable until the next refresh
    pub fn list(&self) -> Arc<[MediaEntry]> {
        self.read(|state| state.entries.clone())
    }

    pub fn len(&self) -> usize {
        self.read(|state| state.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `refresh` has run at least once
    pub fn is_populated(&self) -> bool {
        self.read(|state| state.populated)
    }

    /// Folder the current snapshot was taken from
    pub fn directory(&self) -> Option<PathBuf> {
        self.read(|state| state.directory.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&CatalogState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

impl Default for MediaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_media(directory: &Path, listing: Vec<DirEntryInfo>) -> Vec<MediaEntry> {
    let mut entries: Vec<MediaEntry> = listing
        .into_iter()
        .filter(|entry| !entry.is_directory)
        .filter_map(|entry| MediaEntry::from_path(directory.join(entry.name)))
        .collect();
    entries.sort_by(|a, b| a.path().cmp(b.path()));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct FixedLister(Vec<(&'static str, bool)>);

    impl DirectoryLister for FixedLister {
        fn list(&self, _dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
            Ok(self
                .0
                .iter()
                .map(|(name, is_directory)| DirEntryInfo {
                    name: OsString::from(name),
                    is_directory: *is_directory,
                })
                .collect())
        }
    }

    struct BrokenLister;

    impl DirectoryLister for BrokenLister {
        fn list(&self, _dir: &Path) -> io::Result<Vec<DirEntryInfo>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    fn names(catalog: &MediaCatalog) -> Vec<String> {
        catalog
            .list()
            .iter()
            .map(|e| e.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_refresh_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"").unwrap();
        fs::write(dir.path().join("b.txt"), b"").unwrap();
        fs::write(dir.path().join("c.png"), b"").unwrap();

        let catalog = MediaCatalog::new();
        assert_eq!(catalog.refresh(dir.path()), 2);
        assert_eq!(names(&catalog), vec!["a.mp4", "c.png"]);
        assert_eq!(catalog.list()[0].path(), dir.path().join("a.mp4"));
    }

    #[test]
    fn test_refresh_skips_directories_and_extensionless_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested.mp4")).unwrap();
        fs::write(dir.path().join("nested.mp4").join("inner.mp4"), b"").unwrap();
        fs::write(dir.path().join("LICENSE"), b"").unwrap();
        fs::write(dir.path().join("LOUD.MKV"), b"").unwrap();

        let catalog = MediaCatalog::new();
        assert_eq!(catalog.refresh(dir.path()), 1);
        assert_eq!(names(&catalog), vec!["LOUD.MKV"]);
        assert_eq!(catalog.list()[0].extension(), "mkv");
    }

    #[test]
    fn test_unreadable_directory_yields_empty_catalog() {
        let catalog = MediaCatalog::with_lister(FixedLister(vec![("a.mp4", false)]));
        assert_eq!(catalog.refresh(Path::new("/media")), 1);

        let broken = MediaCatalog::with_lister(BrokenLister);
        assert_eq!(broken.refresh(Path::new("/media")), 0);
        assert!(broken.is_empty());
        assert!(broken.is_populated());
    }

    #[test]
    fn test_missing_directory_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new();
        assert_eq!(catalog.refresh(&dir.path().join("does-not-exist")), 0);
    }

    #[test]
    fn test_empty_path_clears_without_listing() {
        let catalog = MediaCatalog::with_lister(BrokenLister);
        assert!(!catalog.is_populated());
        assert_eq!(catalog.refresh(Path::new("")), 0);
        assert!(catalog.is_populated());
    }

    #[test]
    fn test_snapshot_survives_refresh() {
        let catalog = MediaCatalog::with_lister(FixedLister(vec![
            ("one.webm", false),
            ("two.gif", false),
            ("folder", true),
        ]));
        catalog.refresh(Path::new("/media"));
        let before = catalog.list();

        catalog.refresh(Path::new(""));
        assert_eq!(before.len(), 2);
        assert!(catalog.list().is_empty());
        assert_eq!(catalog.directory(), Some(PathBuf::new()));
    }
}
