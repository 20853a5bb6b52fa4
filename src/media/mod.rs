//! Media file discovery
//!
//! Scans one folder for files the host can play and keeps the result as
//! an immutable snapshot until the next refresh.

mod catalog;

pub use catalog::{DirEntryInfo, DirectoryLister, FsDirectoryLister, MediaCatalog};

use std::path::{Path, PathBuf};

/// Extensions (lower case, no dot) a file needs to be picked
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "jpg", "jpeg", "png", "gif",
];

/// One eligible media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    path: PathBuf,
    extension: String,
}

impl MediaEntry {
    /// Build an entry if the file's extension is on the allow-list
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = media_extension(&path)?;
        Some(Self { path, extension })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lower-cased extension without the dot
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Lower-cased extension of `path` when it is a supported media type
pub fn media_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MEDIA_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_case_insensitive() {
        let entry = MediaEntry::from_path("/media/Clip.MP4").unwrap();
        assert_eq!(entry.extension(), "mp4");
        assert_eq!(entry.path(), Path::new("/media/Clip.MP4"));
        assert!(MediaEntry::from_path("/media/photo.JpEg").is_some());
    }

    #[test]
    fn test_rejects_unknown_or_missing_extension() {
        assert!(MediaEntry::from_path("/media/notes.txt").is_none());
        assert!(MediaEntry::from_path("/media/README").is_none());
        assert!(MediaEntry::from_path("/media/.mp4").is_none());
        assert!(MediaEntry::from_path("/media/archive.mp4.zip").is_none());
    }
}
